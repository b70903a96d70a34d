//! Uses the blocking client and cancels a call while it waits to retry.
//!
//! Run with: `MAILBREEZE_API_KEY=sk_test_... cargo run --example blocking_cancel`

use mailbreeze::{blocking, metadata::RequestOptions, CancelToken, RawJson};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("mailbreeze=debug")
        .init();

    let client = blocking::Client::builder()
        .api_key(std::env::var("MAILBREEZE_API_KEY").unwrap_or_default())
        .retry_base_delay(Duration::from_secs(5))
        .build_blocking()?;

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(2));
            token.cancel();
        })
    };

    let options = RequestOptions::builder().cancel_token(token).build();
    match client.post_with_options::<_, RawJson>("/api/v1/emails", &serde_json::json!({}), options) {
        Ok(response) => println!("Finished with status {}", response.status),
        Err(e) if e.is_interrupted() => println!("Cancelled while waiting to retry"),
        Err(e) => println!("Failed: {}", e),
    }

    canceller.join().ok();
    Ok(())
}
