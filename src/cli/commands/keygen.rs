use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::integrations::crypto::generate_encryption_key;

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let key = generate_encryption_key();
    match output_format {
        OutputFormat::Json => output_success(&output_format, "Generated encryption key", Some(json!({ "key": key }))),
        // bare key so it can be piped into an env file
        OutputFormat::Text => {
            println!("{}", key);
            Ok(())
        }
    }
}
