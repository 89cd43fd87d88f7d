//! TwiML responses for the voice webhook.

/// Spoken when the called number has no active receptionist.
pub const NOT_CONFIGURED_MESSAGE: &str = "This number is not configured. Please try again later.";

/// Spoken when the voice server is not configured.
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable.";

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Connect the call to the voice server's media stream.
///
/// The stream is named after the receptionist so the status callback can
/// attribute the call.
#[must_use]
pub fn connect_stream(ws_url: &str, receptionist_id: &str, status_callback: Option<&str>) -> String {
    let callback = status_callback
        .map(|url| format!(" statusCallback=\"{}\"", escape_xml(url)))
        .unwrap_or_default();
    let id = escape_xml(receptionist_id);

    format!(
        "{XML_HEADER}<Response><Connect><Stream url=\"{}\" name=\"{id}\"{callback}>\
         <Parameter name=\"receptionist_id\" value=\"{id}\"/></Stream></Connect></Response>",
        escape_xml(ws_url)
    )
}

/// Say `message` and hang up.
#[must_use]
pub fn say_and_hangup(message: &str) -> String {
    format!(
        "{XML_HEADER}<Response><Say voice=\"alice\">{}</Say><Hangup/></Response>",
        escape_xml(message)
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
