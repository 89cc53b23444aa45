use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for throttle-proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "THROTTLE_PROXY_API_KEY", default_value = "CHANGE_ME")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show listener state, port and active profile
    Status,
    /// List the built-in throttle profiles
    Profiles,
    /// Switch the active profile
    SetProfile {
        /// Profile name, e.g. `slow_3g` or `offline`
        name: String,
    },
    /// Start the proxy listener
    Start,
    /// Stop the proxy listener
    Stop,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Profiles => client.get(format!("{}/admin/profiles", cli.url)),
        Commands::SetProfile { name } => client
            .put(format!("{}/admin/profile", cli.url))
            .json(&json!({ "name": name })),
        Commands::Start => client.post(format!("{}/admin/start", cli.url)),
        Commands::Stop => client.post(format!("{}/admin/stop", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_key_and_subcommand() {
        let cli = Cli::try_parse_from([
            "proxy-cli",
            "--url",
            "http://127.0.0.1:9000",
            "--key",
            "secret",
            "set-profile",
            "slow_3g",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://127.0.0.1:9000");
        assert_eq!(cli.key, "secret");
        assert!(matches!(cli.command, Commands::SetProfile { ref name } if name == "slow_3g"));
    }

    #[test]
    fn key_arg_reads_the_api_key_variable() {
        let command = Cli::command();
        let key = command
            .get_arguments()
            .find(|arg| arg.get_id() == "key")
            .unwrap();
        assert_eq!(
            key.get_env().and_then(|name| name.to_str()),
            Some("THROTTLE_PROXY_API_KEY")
        );
    }
}
