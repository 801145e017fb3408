use serde::Deserialize;

/// query string shared by the three proxy routes. everything is optional here so a missing
/// parameter turns into our own 400 instead of axum's rejection text
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    // older player builds still send the pre-rename parameter
    #[serde(alias = "moontv-source")]
    pub source: Option<String>,
    #[serde(rename = "allowCORS")]
    pub allow_cors: Option<String>,
}

impl ProxyQuery {
    pub fn allow_direct_cors(&self) -> bool {
        self.allow_cors.as_deref() == Some("true")
    }
}
