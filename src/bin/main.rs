//! Interactive console for the assistant.
//!
//! Every line is a chat message. `/confirm` commits the last proposed
//! change, `/reset` drops the pending dialogue, `/quit` exits.

use finance_chat_assistant::{config::AssistantConfig, ActionResult, Assistant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = AssistantConfig::from_env()?;
    let assistant = Assistant::from_config(&config)?;
    let user_id = Uuid::new_v4();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<ActionResult> = None;

    stdout
        .write_all(b"Finance chat assistant. /confirm, /reset, /quit\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let reply = match line.trim() {
            "/quit" => break,
            "/reset" => {
                assistant.reset(user_id).await?;
                last = None;
                "Đã xoá hội thoại.".to_string()
            }
            "/confirm" => match last.take() {
                Some(result) => confirm_last(&assistant, user_id, result).await,
                None => "Không có gì để xác nhận.".to_string(),
            },
            message => {
                let result = assistant.process_message(message, user_id).await;
                let rendered = render(&result);
                if result.confirmation_id.is_some() {
                    last = Some(result);
                }
                rendered
            }
        };

        stdout.write_all(format!("{}\n> ", reply).as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn render(result: &ActionResult) -> String {
    let mut out = format!("[{:?}] {}", result.action, result.response_text);
    if let Some(slot) = result.waiting_for {
        out.push_str(&format!("\n(waiting for {})", slot.as_str()));
    }
    if result.confirmation_id.is_some() {
        out.push_str("\n(/confirm to save)");
    }
    out
}

async fn confirm_last(assistant: &Assistant, user_id: Uuid, result: ActionResult) -> String {
    let (Some(data), Some(confirmation_id)) = (result.data, result.confirmation_id) else {
        return "Không có gì để xác nhận.".to_string();
    };

    let payload = match serde_json::to_value(&data) {
        Ok(payload) => payload,
        Err(e) => return format!("Lỗi: {}", e),
    };

    match assistant
        .confirm(user_id, result.action, payload, &confirmation_id)
        .await
    {
        Ok(committed) => committed.response_text,
        Err(e) => {
            warn!("Confirm failed: {}", e);
            format!("Lỗi: {}", e)
        }
    }
}
