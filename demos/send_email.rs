//! Sends an email and reads it back with the async client.
//!
//! This example shows how to:
//! - Configure a client from the `MAILBREEZE_API_KEY` environment variable
//! - Send an email with an idempotency key so retries cannot double-send
//! - Read paginated results with query parameters
//! - Match on typed errors
//!
//! Run with: `MAILBREEZE_API_KEY=sk_test_... cargo run --example send_email`

use mailbreeze::{metadata::RequestOptions, Client, Error, RawJson};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SendEmail {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct SentEmail {
    id: String,
    status: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("mailbreeze=debug,send_email=info")
        .init();

    let client = Client::builder()
        .api_key(std::env::var("MAILBREEZE_API_KEY").unwrap_or_default())
        .max_retries(3)
        .jitter(true)
        .build()?;

    let email = SendEmail {
        from: "hello@example.com".to_string(),
        to: vec!["someone@example.com".to_string()],
        subject: "Welcome aboard".to_string(),
        html: "<p>Thanks for signing up!</p>".to_string(),
    };
    let options = RequestOptions::builder()
        .idempotency_key("welcome-someone@example.com")
        .build();

    let sent = match client
        .post_with_options::<_, SentEmail>("/api/v1/emails", &email, options)
        .await
    {
        Ok(response) => response,
        Err(Error::Validation(info)) => {
            eprintln!("Rejected: {} ({:?})", info.message(), info.details());
            return Ok(());
        }
        Err(Error::Authentication(_)) => {
            eprintln!("Check MAILBREEZE_API_KEY");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Sent after {} attempt(s) in {:?}",
        sent.attempts, sent.latency
    );

    if let Some(email) = sent.data {
        let fetched = client
            .get::<SentEmail>(format!("/api/v1/emails/{}", email.id))
            .await?;
        if let Some(email) = fetched.data {
            println!("{} is {}", email.id, email.status);
        }
    }

    let page = client
        .get_with_query::<Vec<RawJson>, _, _>("/api/v1/emails", [("page", "1"), ("limit", "10")])
        .await?;
    println!(
        "First page has {} email(s), meta {:?}",
        page.data.map(|emails| emails.len()).unwrap_or(0),
        page.meta
    );

    Ok(())
}
