use std::env;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relay_bridge::protocol::relay::{
    decode_envelope, encode_payload, ChatCompletionComplete, ChatCompletionPartial, Payload,
    RegisterClientResponse, RelayError, ToolCall, ToolCallFunction,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_RELAY_PORT: u16 = 19_100;

#[derive(Copy, Clone)]
enum MockScenario {
    Text,
    Tools,
    Error,
    Reject,
    Fee,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let port = env_u16("RELAY_PORT", DEFAULT_RELAY_PORT);
    let delay = Duration::from_millis(u64::from(env_u16("MOCK_DELAY_MS", 0)));
    let scenario = parse_scenario();

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap_or_else(|err| panic!("failed to bind mock relay on 127.0.0.1:{port}: {err}"));
    eprintln!("mock relay listening on ws://127.0.0.1:{port}/consumer/ws");

    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                eprintln!("accept error: {err}");
                continue;
            }
        };
        tokio::spawn(async move {
            if let Err(err) = serve_client(stream, scenario, delay).await {
                eprintln!("mock relay session with {remote_addr} failed: {err}");
            }
        });
    }
}

async fn serve_client(
    stream: TcpStream,
    scenario: MockScenario,
    delay: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;

    let register = next_payload(&mut ws).await?;
    let Some(Payload::RegisterClientRequest(request)) = register else {
        return Err("expected RegisterClientRequest".into());
    };
    let client = request.metadata.map(|m| m.name).unwrap_or_default();
    eprintln!("registration from '{client}'");

    let registration = match scenario {
        MockScenario::Reject => RegisterClientResponse {
            ok: false,
            message: "identity is not allowed on this relay".to_string(),
            invoice: None,
        },
        MockScenario::Fee => RegisterClientResponse {
            ok: true,
            message: String::new(),
            invoice: Some("lnbcrt10u1mockregistrationfee".to_string()),
        },
        _ => RegisterClientResponse {
            ok: true,
            message: String::new(),
            invoice: None,
        },
    };
    let accepted = registration.ok && registration.invoice.is_none();
    send(&mut ws, Payload::RegisterClientResponse(registration)).await?;
    if !accepted {
        ws.close(None).await?;
        return Ok(());
    }

    loop {
        match next_payload(&mut ws).await? {
            Some(Payload::ChatCompletionRequest(request)) => {
                eprintln!(
                    "chat request {} ({} messages, tier '{}')",
                    request.request_id,
                    request.messages.len(),
                    request.tier_selector
                );
                break;
            }
            Some(other) => eprintln!("ignoring {}", other.kind()),
            None => return Ok(()),
        }
    }

    for reply in scenario_replies(scenario) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        send(&mut ws, reply).await?;
    }
    while let Some(Ok(_)) = ws.next().await {}
    Ok(())
}

fn scenario_replies(scenario: MockScenario) -> Vec<Payload> {
    match scenario {
        MockScenario::Text | MockScenario::Reject | MockScenario::Fee => vec![
            partial("Hello", Vec::new()),
            partial(" from the", Vec::new()),
            partial(" mock relay.", Vec::new()),
            complete(Some("lnbcrt1u1mockusage")),
        ],
        MockScenario::Tools => vec![
            partial("", vec![fragment("call_mock_1", "get_weather", "{\"city\":")]),
            partial("", vec![fragment("", "", "\"Lisbon\"}")]),
            complete(None),
        ],
        MockScenario::Error => vec![
            partial("Partial answer", Vec::new()),
            Payload::RelayError(RelayError {
                message: "provider disconnected".to_string(),
            }),
        ],
    }
}

fn partial(text: &str, tool_calls: Vec<ToolCall>) -> Payload {
    Payload::ChatCompletionPartial(ChatCompletionPartial {
        message: text.to_string(),
        tool_calls,
    })
}

fn fragment(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        r#type: "function".to_string(),
        function: Some(ToolCallFunction {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }),
    }
}

fn complete(invoice: Option<&str>) -> Payload {
    Payload::ChatCompletionComplete(ChatCompletionComplete {
        invoice: invoice.map(str::to_string),
    })
}

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
    payload: Payload,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    ws.send(Message::Binary(encode_payload(payload).into())).await
}

async fn next_payload(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
) -> Result<Option<Payload>, Box<dyn std::error::Error + Send + Sync>> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Binary(data) => return Ok(Some(decode_envelope(&data)?)),
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

fn parse_scenario() -> MockScenario {
    match env::var("MOCK_SCENARIO").as_deref() {
        Ok("tools") => MockScenario::Tools,
        Ok("error") => MockScenario::Error,
        Ok("reject") => MockScenario::Reject,
        Ok("fee") => MockScenario::Fee,
        Ok("text") | Err(_) => MockScenario::Text,
        Ok(other) => {
            eprintln!("unknown MOCK_SCENARIO '{other}', fallback to text");
            MockScenario::Text
        }
    }
}
