//! Smoke client: post one sample alert to a running receiver.
//!
//! Usage: fire_alert [URL] [ALERTNAME]

use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT_URL: &str = "http://localhost:5000/alert";
const DEFAULT_ALERTNAME: &str = "HighCPUUsage";

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let alertname = args.next().unwrap_or_else(|| DEFAULT_ALERTNAME.to_string());

    let payload = json!({
        "receiver": "fire_alert",
        "status": "firing",
        "alerts": [
            {
                "status": "firing",
                "labels": {
                    "alertname": alertname,
                    "severity": "critical"
                },
                "annotations": {
                    "summary": "Sample alert sent by fire_alert"
                },
                "startsAt": chrono::Utc::now().to_rfc3339()
            }
        ]
    });

    let client = match Client::builder().timeout(Duration::from_secs(30)).build() {
        Ok(client) => client,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    match client.post(&url).json(&payload).send().await {
        Ok(response) => {
            println!("Status Code: {}", response.status().as_u16());
            match response.text().await {
                Ok(text) => println!("Response: {}", text),
                Err(e) => println!("Error: {}", e),
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}
