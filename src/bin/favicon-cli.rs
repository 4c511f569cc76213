use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "favicon-cli")]
#[command(about = "Management CLI for the favicon service", long_about = None)]
struct Cli {
    /// Base URL of the running service.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Status,
    /// Fetch a favicon and write it to a file
    Fetch {
        /// Website URL or domain to resolve a favicon for
        site: String,

        /// Output size in pixels (16-256)
        #[arg(short, long, default_value_t = 32)]
        size: u32,

        /// Preferred format: avif, webp or png
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Output file path
        #[arg(short, long, default_value = "favicon.out")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            let status = res.status();
            let body = res.text().await?;
            println!("{status}: {body}");
        }
        Commands::Fetch {
            site,
            size,
            format,
            out,
        } => {
            let accept = match format.as_str() {
                "avif" => "image/avif,image/webp,image/png",
                "webp" => "image/webp,image/png",
                _ => "image/png",
            };
            let size_param = size.to_string();
            let res = client
                .get(format!("{}/favicons", cli.url))
                .query(&[("url", site.as_str()), ("sz", size_param.as_str())])
                .header(reqwest::header::ACCEPT, accept)
                .send()
                .await?;

            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: service returned status {status}");
                return Ok(());
            }
            let content_type = res
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            let body = res.bytes().await?;
            std::fs::write(&out, &body)?;
            println!("{} bytes ({content_type}) -> {}", body.len(), out.display());
        }
    }

    Ok(())
}
