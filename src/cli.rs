use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "reelgrab")]
#[command(about = "Resolve short-form video pages into playable media URLs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Server(ServerArgs),
    /// Resolve a single page URL and print the result as JSON
    Resolve(ResolveArgs),
    /// List the providers configured for a platform, in attempt order
    Providers(ProvidersArgs),
    /// Check whether one provider is reachable
    Probe(ProbeArgs),
    /// Print the effective configuration as TOML (secrets omitted)
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to; defaults to `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Page URL, e.g. https://www.tiktok.com/@user/video/123
    pub url: String,

    /// Try the local extractor before remote services
    #[arg(long)]
    pub prefer_local_extractor: bool,

    /// `best` or a height such as `720p`
    #[arg(long)]
    pub quality: Option<String>,

    /// Skip classification and treat the URL as this platform
    #[arg(long)]
    pub platform: Option<String>,

    /// Also save the media into `fetcher.download_dir`
    #[arg(long)]
    pub download: bool,
}

#[derive(clap::Args, Debug)]
pub struct ProvidersArgs {
    /// tiktok, instagram or youtube
    pub platform: String,
}

#[derive(clap::Args, Debug)]
pub struct ProbeArgs {
    /// Provider id as shown by `providers`
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from([
            "reelgrab",
            "resolve",
            "https://youtu.be/abc",
            "--prefer-local-extractor",
            "--quality",
            "720p",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.url, "https://youtu.be/abc");
                assert!(args.prefer_local_extractor);
                assert_eq!(args.quality.as_deref(), Some("720p"));
                assert!(!args.download);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_server_address_is_optional() {
        let cli = Cli::try_parse_from(["reelgrab", "server"]).unwrap();
        assert!(matches!(cli.command, Commands::Server(ServerArgs { address: None })));
    }
}
