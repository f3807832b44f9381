use std::process::Stdio;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const ALERT_TITLE: &str = "Flight Alert";
const TWILIO_API: &str = "https://api.twilio.com/2010-04-01/Accounts";

struct SecretString(String);

impl SecretString {
    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Mobile carriers with an email-to-SMS gateway.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Carrier {
    Verizon,
    Att,
    TMobile,
    Sprint,
    UsCellular,
    MetroPcs,
}

impl Carrier {
    pub fn name(&self) -> &'static str {
        match self {
            Carrier::Verizon => "Verizon",
            Carrier::Att => "AT&T",
            Carrier::TMobile => "T-Mobile",
            Carrier::Sprint => "Sprint",
            Carrier::UsCellular => "US Cellular",
            Carrier::MetroPcs => "Metro PCS",
        }
    }

    pub fn gateway(&self) -> &'static str {
        match self {
            Carrier::Verizon => "vtext.com",
            Carrier::Att => "txt.att.net",
            Carrier::TMobile => "tmomail.net",
            Carrier::Sprint => "messaging.sprintpcs.com",
            Carrier::UsCellular => "email.uscc.net",
            Carrier::MetroPcs => "mymetropcs.com",
        }
    }
}

impl FromStr for Carrier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .to_ascii_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        match normalized.as_str() {
            "verizon" => Ok(Carrier::Verizon),
            "att" => Ok(Carrier::Att),
            "tmobile" => Ok(Carrier::TMobile),
            "sprint" => Ok(Carrier::Sprint),
            "uscellular" | "uscc" => Ok(Carrier::UsCellular),
            "metropcs" | "metro" => Ok(Carrier::MetroPcs),
            _ => Err(anyhow!("Unknown carrier: {s:?}")),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notifier {
    Stdout,
    Desktop,
    IMessage { recipient: String },
    CarrierGateway { number: String, carrier: Carrier },
    Twilio { to: String },
}

impl Notifier {
    pub async fn send(&self, message: &str) -> Result<()> {
        match self {
            Notifier::Stdout => {
                println!("{message}");
                Ok(())
            }
            Notifier::Desktop => send_desktop(message).await,
            Notifier::IMessage { recipient } => send_imessage(recipient, message).await,
            Notifier::CarrierGateway { number, carrier } => {
                send_carrier(number, *carrier, message).await
            }
            Notifier::Twilio { to } => {
                TwilioClient::from_env()?
                    .send(&us_number(to), &timestamped(message))
                    .await
            }
        }
    }
}

/// Escapes a value for use inside an AppleScript string literal.
fn applescript_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn desktop_script(message: &str) -> String {
    format!(
        "display notification {} with title {}",
        applescript_quote(message),
        applescript_quote(ALERT_TITLE)
    )
}

fn imessage_script(recipient: &str, message: &str) -> String {
    format!(
        r#"tell application "Messages"
    set targetService to 1st service whose service type = iMessage
    set targetBuddy to buddy {} of targetService
    send {} to targetBuddy
end tell"#,
        applescript_quote(recipient),
        applescript_quote(message)
    )
}

async fn run(program: &str, args: &[&str], stdin: Option<&str>) -> Result<()> {
    debug!("Running {program} {args:?}");
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start {program}"))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await?;
        drop(pipe);
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

async fn send_desktop(message: &str) -> Result<()> {
    if cfg!(target_os = "macos") {
        run("osascript", &["-e", &desktop_script(message)], None).await?;
    } else {
        run("notify-send", &[ALERT_TITLE, message], None).await?;
    }
    info!("Desktop notification sent");
    Ok(())
}

async fn send_imessage(recipient: &str, message: &str) -> Result<()> {
    run("osascript", &["-e", &imessage_script(recipient, message)], None).await?;
    info!("iMessage sent to {recipient}");
    Ok(())
}

fn gateway_address(number: &str, carrier: Carrier) -> Result<String> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_owned(),
        _ => bail!("Expected a 10-digit phone number, got {number:?}"),
    };
    Ok(format!("{}@{}", digits, carrier.gateway()))
}

async fn send_carrier(number: &str, carrier: Carrier, message: &str) -> Result<()> {
    let address = gateway_address(number, carrier)?;
    run("mail", &["-s", ALERT_TITLE, &address], Some(message)).await?;
    info!("SMS sent via {} gateway", carrier.name());
    Ok(())
}

/// Prefixes bare 10-digit numbers with the US country code.
fn us_number(number: &str) -> String {
    let trimmed = number.trim();
    if trimmed.len() == 10 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("+1{trimmed}")
    } else {
        trimmed.to_owned()
    }
}

fn timestamped(message: &str) -> String {
    format!("{}\n{}", message, chrono::Local::now().format("%m/%d %H:%M"))
}

struct TwilioClient {
    account_sid: String,
    auth_token: SecretString,
    from: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

impl TwilioClient {
    fn from_env() -> Result<Self> {
        let account_sid =
            std::env::var("TWILIO_ACCOUNT_SID").context("TWILIO_ACCOUNT_SID env var not set")?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .map(SecretString)
            .context("TWILIO_AUTH_TOKEN env var not set")?;
        let from =
            std::env::var("TWILIO_PHONE_NUMBER").context("TWILIO_PHONE_NUMBER env var not set")?;

        Ok(Self {
            account_sid,
            auth_token,
            from,
            client: Client::new(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/Messages.json", TWILIO_API, self.account_sid)
    }

    async fn send(&self, to: &str, body: &str) -> Result<()> {
        debug!("Sending SMS to {to} from {}", self.from);
        let message: TwilioMessage = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose()))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!("SMS sent, message SID: {}", message.sid);
        Ok(())
    }
}
