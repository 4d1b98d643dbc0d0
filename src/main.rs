use ask_openrouter::{Client, Config, Error};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    // stdout carries the reply only, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    info!(?config, "loaded configuration");

    let client = Client::from_config(&config)?;
    let request = config.request();

    let response = client.chat_completions(&request)?;
    if let Some(usage) = response.usage.as_ref() {
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion finished"
        );
    }

    println!("{}", response.first_content()?);

    Ok(())
}
