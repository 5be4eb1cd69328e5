use clap::Parser;
use docrelay_core::{CompletionOptions, DEFAULT_OPENAI_BASE_URL};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "docrelay", version)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "DOCRELAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "DOCRELAY_PORT", default_value = "5000")]
    pub port: u16,

    /// Directory where uploaded documents are stored
    #[arg(long, env = "DOCRELAY_UPLOAD_DIR", default_value = "docs/")]
    pub upload_dir: PathBuf,

    /// Comma separated list of accepted file extensions
    #[arg(
        long,
        env = "DOCRELAY_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_value = "pdf,jpg,jpeg,png"
    )]
    pub allowed_extensions: Vec<String>,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "DOCRELAY_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Retrieval index service base URL
    #[arg(long, env = "DOCRELAY_INDEX_URL", default_value = "http://localhost:8001")]
    pub index_url: String,

    /// Name of the retrieval index shared by the whole process
    #[arg(long, env = "DOCRELAY_INDEX_NAME", default_value = docrelay_core::DEFAULT_INDEX_NAME)]
    pub index_name: String,

    /// API key for the chat completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Chat completion service base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// Chat model name
    #[arg(long, env = "DOCRELAY_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Completion token limit per chat request
    #[arg(long, env = "DOCRELAY_MAX_TOKENS", default_value = "4000")]
    pub max_tokens: u32,
}

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.chat_model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults_match_the_documented_service() {
        let cli = Cli::try_parse_from(["docrelay", "--openai-api-key", "sk-test"]).expect("cli should parse");

        assert_eq!(cli.port, 5000);
        assert_eq!(cli.index_name, "test");
        assert_eq!(cli.allowed_extensions, ["pdf", "jpg", "jpeg", "png"]);
        assert_eq!(cli.completion_options().model, "gpt-4o-mini");
        assert_eq!(cli.completion_options().max_tokens, 4000);
    }

    #[test]
    fn extensions_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "docrelay",
            "--openai-api-key",
            "sk-test",
            "--allowed-extensions",
            "pdf,tiff",
        ])
        .expect("cli should parse");

        assert_eq!(cli.allowed_extensions, ["pdf", "tiff"]);
    }
}
