//! Server-rendered HTML for the browser pairing flow.
//!
//! Pages are plain `format!` templates. Every interpolated value goes
//! through [`escape`].

use pairline_client::pairing::decode_data_url;
use pairline_core::SessionState;
use pairline_runtime::SessionView;

/// Seconds between automatic reloads of the pairing page.
pub const QR_REFRESH_SECS: u64 = 20;
/// Seconds between reloads while a session is still starting.
pub const PENDING_REFRESH_SECS: u64 = 3;

const QR_SCRIPT_SRC: &str = "https://cdn.jsdelivr.net/npm/qrcodejs@1.0.0/qrcode.min.js";

/// Escape text for HTML body and attribute contexts.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n{head}</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

fn refresh(secs: u64) -> String {
    format!("<meta http-equiv=\"refresh\" content=\"{secs}\">\n")
}

/// Landing page: a start link and the live sessions.
pub fn index_page(sessions: &[SessionView]) -> String {
    let mut body = String::from("<p><a href=\"/start-session\">Start a new session</a></p>\n");
    if sessions.is_empty() {
        body.push_str("<p>No active sessions.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for view in sessions {
            let id = escape(view.id.as_str());
            body.push_str(&format!(
                "<li><a href=\"/qr/{id}\">{id}</a> ({state})</li>\n",
                state = view.state,
            ));
        }
        body.push_str("</ul>\n");
    }
    layout("pairline", "", &body)
}

/// Pairing page for a session awaiting a scan.
///
/// Reloads periodically so a rotated code is picked up, and follows the
/// session on the push channel to move on as soon as it is ready.
pub fn qr_page(view: &SessionView, payload: &str) -> String {
    let id = escape(view.id.as_str());
    let code = decode_data_url(payload).unwrap_or_default();
    let body = format!(
        "<p>Scan this code with the phone you want to pair.</p>\n\
         <div id=\"qr\" data-code=\"{code}\"></div>\n\
         <p><img id=\"qr-payload\" src=\"{payload}\" alt=\"pairing code\" hidden></p>\n\
         <pre id=\"qr-code\">{code}</pre>\n\
         <script src=\"{QR_SCRIPT_SRC}\"></script>\n\
         <script>\n\
         (function () {{\n\
           var target = document.getElementById('qr');\n\
           function draw(code) {{\n\
             target.innerHTML = '';\n\
             document.getElementById('qr-code').textContent = code;\n\
             if (window.QRCode) {{ new QRCode(target, code); }}\n\
           }}\n\
           draw(target.dataset.code);\n\
           var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';\n\
           var ws = new WebSocket(proto + location.host + '/ws?sessionId={id}');\n\
           ws.onmessage = function (msg) {{\n\
             var event = JSON.parse(msg.data);\n\
             if (event.type === 'ready') {{ location.href = '/send-message/{id}'; }}\n\
             if (event.type === 'qr') {{\n\
               var encoded = event.qrCodeData.split(',')[1] || '';\n\
               draw(atob(encoded));\n\
             }}\n\
           }};\n\
         }})();\n\
         </script>\n",
        code = escape(&code),
        payload = escape(payload),
    );
    layout(
        &format!("Pair session {}", view.id),
        &refresh(QR_REFRESH_SECS),
        &body,
    )
}

/// Placeholder while no pairing code is available.
pub fn pending_page(view: &SessionView) -> String {
    let detail = match view.state {
        SessionState::Created => "Waiting for the messaging client to start.",
        SessionState::Authenticated => "Paired. Waiting for the session to become ready.",
        SessionState::Failed => "Authentication failed. Start a new session or log out.",
        SessionState::Disconnected => "The client disconnected. Start a new session or log out.",
        _ => "Not yet available.",
    };
    let body = format!(
        "<p>QR code not yet available (state: {state}).</p>\n<p>{detail}</p>\n\
         <p><a href=\"/qr/{id}\">Refresh</a></p>\n",
        state = view.state,
        id = escape(view.id.as_str()),
    );
    layout("Session starting", &refresh(PENDING_REFRESH_SECS), &body)
}

/// Send form for a ready session.
pub fn send_form_page(view: &SessionView) -> String {
    let id = escape(view.id.as_str());
    let body = format!(
        "<form method=\"post\" action=\"/send-message/{id}\">\n\
         <p><label>Phone number <input name=\"number\" required></label></p>\n\
         <p><label>Message <textarea name=\"message\" required></textarea></label></p>\n\
         <p><button type=\"submit\">Send</button></p>\n\
         </form>\n\
         <form method=\"post\" action=\"/logout/{id}\">\n\
         <p><button type=\"submit\">Log out</button></p>\n\
         </form>\n"
    );
    layout(&format!("Send from {}", view.id), "", &body)
}

/// Error page with a link home.
pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        "<p>{}</p>\n<p><a href=\"/\">Back</a></p>\n",
        escape(message)
    );
    layout(title, "", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pairline_core::SessionId;

    fn view(state: SessionState, qr_payload: Option<&str>) -> SessionView {
        SessionView {
            id: SessionId::from("s1"),
            state,
            qr_payload: qr_payload.map(String::from),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn escape_special_characters() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn qr_page_shows_code_and_subscribes() {
        let payload = "data:text/plain;base64,WDEyMw==";
        let html = qr_page(&view(SessionState::AwaitingScan, Some(payload)), payload);
        assert!(html.contains("X123"));
        assert!(html.contains(payload));
        assert!(html.contains("/ws?sessionId=s1"));
        assert!(html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn qr_page_escapes_foreign_payload() {
        let payload = "\"><script>alert(1)</script>";
        let html = qr_page(&view(SessionState::AwaitingScan, Some(payload)), payload);
        assert!(!html.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn pending_page_mentions_state() {
        let html = pending_page(&view(SessionState::Created, None));
        assert!(html.contains("not yet available"));
        assert!(html.contains("created"));
    }

    #[test]
    fn send_form_posts_to_session() {
        let html = send_form_page(&view(SessionState::Ready, None));
        assert!(html.contains("action=\"/send-message/s1\""));
        assert!(html.contains("name=\"number\""));
        assert!(html.contains("name=\"message\""));
    }

    #[test]
    fn index_lists_sessions() {
        let html = index_page(&[view(SessionState::Ready, None)]);
        assert!(html.contains("/start-session"));
        assert!(html.contains("href=\"/qr/s1\""));
        assert!(index_page(&[]).contains("No active sessions"));
    }
}
