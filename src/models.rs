use std::{fmt, str::FromStr};

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, NoneAsEmptyString};

use crate::errors::CoreError;

/// An encoded image reference of the form `data:<mime>;base64,<bytes>`.
///
/// The body is checked once for valid base64 and then forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    uri: String,
    // byte offsets into `uri`
    mime_end: usize,
    data_start: usize,
}

impl ImagePayload {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::validation("Image must be a data URI (data:<mime>;base64,<data>)."))?;
        let (mime, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| CoreError::validation("Image data URI must be base64 encoded."))?;
        if mime.is_empty() || !mime.contains('/') {
            return Err(CoreError::validation("Image data URI is missing a MIME type."));
        }
        if data.is_empty() {
            return Err(CoreError::validation("Image data URI has an empty body."));
        }
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| CoreError::validation(format!("Image data is not valid base64: {e}")))?;

        let mime_end = "data:".len() + mime.len();
        Ok(Self {
            uri: raw.to_string(),
            mime_end,
            data_start: mime_end + ";base64,".len(),
        })
    }

    /// Packages raw image bytes into a payload.
    pub fn encode(bytes: &[u8], mime_type: &str) -> Result<Self, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::MissingInput);
        }
        let mime_type = mime_type.trim();
        if !mime_type.starts_with("image/") || mime_type.len() == "image/".len() {
            return Err(CoreError::validation(format!(
                "Unsupported file type '{mime_type}', please upload an image."
            )));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::parse(&format!("data:{mime_type};base64,{encoded}"))
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn mime_type(&self) -> &str {
        &self.uri["data:".len()..self.mime_end]
    }

    pub fn data(&self) -> &str {
        &self.uri[self.data_start..]
    }
}

impl fmt::Display for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,[{} chars]", self.mime_type(), self.data().len())
    }
}

fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetMarket {
    GenZ,
    YoungProfessionals,
    Families,
}

impl TargetMarket {
    pub const ALL: [TargetMarket; 3] = [Self::GenZ, Self::YoungProfessionals, Self::Families];

    /// Label shown to users and substituted into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GenZ => "Gen Z",
            Self::YoungProfessionals => "Young Professionals",
            Self::Families => "Families",
        }
    }
}

impl fmt::Display for TargetMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TargetMarket {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "genz" => Ok(Self::GenZ),
            "youngprofessionals" => Ok(Self::YoungProfessionals),
            "families" => Ok(Self::Families),
            "" => Err(CoreError::validation("Target market is required.")),
            _ => Err(CoreError::validation(format!(
                "Unknown target market '{}'. Expected one of: Gen Z, Young Professionals, Families.",
                s.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DescriptionLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl DescriptionLength {
    pub const ALL: [DescriptionLength; 3] = [Self::Short, Self::Medium, Self::Long];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Short => "Short",
            Self::Medium => "Medium",
            Self::Long => "Long",
        }
    }

    /// Absent or blank values resolve to the default length.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for DescriptionLength {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(CoreError::validation(format!(
                "Unknown length '{}'. Expected one of: Short, Medium, Long.",
                s.trim()
            ))),
        }
    }
}

/// Validated input of the describe flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub image: ImagePayload,
    pub custom_prompt: Option<String>,
    pub target_market: TargetMarket,
    pub length: DescriptionLength,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub features: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionResult {
    pub product_description: String,
}

/// Both flow results, produced only when both succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedContent {
    pub analysis: String,
    pub description: String,
}

/// What the caller receives: the two texts or a single error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregatedOutcome {
    Success { analysis: String, description: String },
    Failure { error: String },
}

impl AggregatedOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<GeneratedContent> for AggregatedOutcome {
    fn from(c: GeneratedContent) -> Self {
        Self::Success { analysis: c.analysis, description: c.description }
    }
}

/// Raw caller input. Values stay unparsed so each flow validates its own schema.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentInput {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub image: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub target_market: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub length: Option<String>,
}
