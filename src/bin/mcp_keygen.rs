use aiden_mcp::security::{generate_api_key, hash_api_key, Permission, DEFAULT_KEY_PREFIX};
use clap::Parser;
use serde_json::json;

/// Generates an API key and prints the entry to add to the key file.
#[derive(Parser, Debug)]
#[command(name = "mcp-keygen")]
struct Args {
    /// Human readable key name
    #[arg(short, long, default_value = "Generated Key")]
    name: String,

    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,

    /// Permissions to grant
    #[arg(long, value_delimiter = ',', default_value = "read,write")]
    permissions: Vec<String>,

    /// Per-key requests per window
    #[arg(long)]
    rate_limit: Option<u32>,
}

fn main() {
    let args = Args::parse();

    let permissions: Result<Vec<Permission>, _> = args
        .permissions
        .iter()
        .map(|p| serde_json::from_value(json!(p.trim().to_lowercase())))
        .collect();
    let permissions = match permissions {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Unknown permission (expected read, write or admin): {}", e);
            std::process::exit(2);
        }
    };

    let key = generate_api_key(&args.prefix);

    let entry = json!({
        "key_hash": hash_api_key(&key),
        "name": args.name,
        "tier": "custom",
        "permissions": permissions,
        "rate_limit": args.rate_limit,
    });

    println!("API key (shown once): {}", key);
    match serde_json::to_string_pretty(&entry) {
        Ok(text) => println!("Key file entry:\n{}", text),
        Err(e) => {
            eprintln!("Failed to render key file entry: {}", e);
            std::process::exit(1);
        }
    }
}
