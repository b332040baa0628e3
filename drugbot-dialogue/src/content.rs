//! Static drug content table.
//!
//! The table is total over the four menu codes. It is built either from the
//! built-in entries or from a JSON content file and is validated once at
//! startup; a table that fails validation is a configuration defect.
//!
//! Detail texts mark emoji positions with `$`. Glyphs listed for an entry are
//! paired with those placeholders in order, which yields the annotation
//! offsets sent to LINE.

use crate::reply::{Annotation, ReplyPayload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Placeholder character LINE replaces with an emoji.
pub const GLYPH_PLACEHOLDER: char = '$';

const MENU_HEADER: &str = "請輸入以下數字以選擇藥物:";
const MENU_FOOTER: &str = "我將為您解析該藥物之副作用與注意事項";

/// Reply for a confirmation keystroke without a pending selection.
pub const SELECT_FIRST_TEXT: &str = "請先選擇藥物編號(1-4)，再輸入a查看詳細資訊。";

/// Menu selector identifying a drug entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrugCode {
    One,
    Two,
    Three,
    Four,
}

impl DrugCode {
    pub const ALL: [DrugCode; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// Exact match against "1".."4".
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "1" => Some(Self::One),
            "2" => Some(Self::Two),
            "3" => Some(Self::Three),
            "4" => Some(Self::Four),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
        }
    }

    const fn index(&self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }
}

impl std::fmt::Display for DrugCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a drug table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Missing entry for code {0}")]
    MissingCode(DrugCode),

    #[error("Unknown drug code {0:?}")]
    UnknownCode(String),

    #[error("Duplicate entry for code {0}")]
    DuplicateCode(DrugCode),

    #[error("Entry {code} has an empty {field}")]
    EmptyField { code: DrugCode, field: &'static str },

    #[error("Entry {code} has {placeholders} glyph placeholders but {glyphs} glyphs")]
    GlyphMismatch {
        code: DrugCode,
        placeholders: usize,
        glyphs: usize,
    },

    #[error("Failed to read content file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse content file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// LINE emoji reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphAsset {
    pub product_id: String,
    pub emoji_id: String,
}

/// Unvalidated entry as written in a content file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugEntrySource {
    pub code: String,
    pub name: String,
    pub prompt: String,
    pub detail_text: String,
    #[serde(default)]
    pub glyphs: Vec<GlyphAsset>,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    drugs: Vec<DrugEntrySource>,
}

/// Validated drug entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugEntry {
    pub code: DrugCode,
    pub name: String,
    pub prompt: String,
    pub detail_text: String,
    pub annotations: Vec<Annotation>,
}

impl DrugEntry {
    fn from_source(code: DrugCode, source: DrugEntrySource) -> Result<Self, TableError> {
        for (field, value) in [
            ("name", &source.name),
            ("prompt", &source.prompt),
            ("detail_text", &source.detail_text),
        ] {
            if value.trim().is_empty() {
                return Err(TableError::EmptyField { code, field });
            }
        }

        let offsets: Vec<usize> = source
            .detail_text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == GLYPH_PLACEHOLDER)
            .map(|(i, _)| i)
            .collect();

        if offsets.len() != source.glyphs.len() {
            return Err(TableError::GlyphMismatch {
                code,
                placeholders: offsets.len(),
                glyphs: source.glyphs.len(),
            });
        }

        let annotations = offsets
            .into_iter()
            .zip(source.glyphs)
            .map(|(offset, glyph)| Annotation {
                offset,
                product_id: glyph.product_id,
                emoji_id: glyph.emoji_id,
            })
            .collect();

        Ok(Self {
            code,
            name: source.name,
            prompt: source.prompt,
            detail_text: source.detail_text,
            annotations,
        })
    }

    /// The step-two reply for this drug.
    pub fn detail_reply(&self) -> ReplyPayload {
        ReplyPayload::annotated(self.detail_text.clone(), self.annotations.clone())
    }
}

/// Total lookup table from code to entry.
#[derive(Debug, Clone)]
pub struct DrugTable {
    /// Ordered by code; always exactly one entry per `DrugCode`.
    entries: Vec<DrugEntry>,
    menu_text: String,
}

impl DrugTable {
    /// Validate entries and build the table.
    pub fn from_sources(sources: Vec<DrugEntrySource>) -> Result<Self, TableError> {
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(DrugCode::ALL.len());

        for source in sources {
            let code = DrugCode::parse(source.code.trim())
                .ok_or_else(|| TableError::UnknownCode(source.code.clone()))?;
            if !seen.insert(code) {
                return Err(TableError::DuplicateCode(code));
            }
            entries.push(DrugEntry::from_source(code, source)?);
        }

        if let Some(missing) = DrugCode::ALL.into_iter().find(|c| !seen.contains(c)) {
            return Err(TableError::MissingCode(missing));
        }

        entries.sort_by_key(|e| e.code);
        let menu_text = render_menu(&entries);

        Ok(Self { entries, menu_text })
    }

    /// Load and validate a JSON content file.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let file: ContentFile =
            serde_json::from_str(&content).map_err(|source| TableError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        Self::from_sources(file.drugs)
    }

    /// The built-in chemotherapy side-effect guide.
    pub fn builtin() -> Result<Self, TableError> {
        Self::from_sources(builtin_sources())
    }

    pub fn entry(&self, code: DrugCode) -> &DrugEntry {
        &self.entries[code.index()]
    }

    pub fn entries(&self) -> &[DrugEntry] {
        &self.entries
    }

    /// Listing of every code and drug name.
    pub fn menu_text(&self) -> &str {
        &self.menu_text
    }
}

fn render_menu(entries: &[DrugEntry]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|e| format!("{}. {}", e.code, e.name))
        .collect();
    format!("{MENU_HEADER}\n{}\n\n{MENU_FOOTER}", lines.join("\n"))
}

fn source(
    code: &str,
    name: &str,
    prompt: &str,
    detail_text: &str,
    glyphs: Vec<GlyphAsset>,
) -> DrugEntrySource {
    DrugEntrySource {
        code: code.into(),
        name: name.into(),
        prompt: prompt.into(),
        detail_text: detail_text.into(),
        glyphs,
    }
}

fn builtin_sources() -> Vec<DrugEntrySource> {
    vec![
        source(
            "1",
            "Cyclophosphamide",
            "輸入a表示膀胱出血、血尿",
            "藥物的代謝物排泄至尿液後會引起泌尿道，尤其是膀胱的改變，若出現出血性膀胱炎或血尿等現象，請立即回診就醫\n\n\
             平時請喝大量開水$，並時常排尿，若醫師無特殊指示，建議於晨間服用，降低對膀胱之副作用",
            vec![GlyphAsset {
                product_id: "5ac21e6c040ab15980c9b444".into(),
                emoji_id: "104".into(),
            }],
        ),
        source(
            "2",
            "Doxorubicin",
            "輸入a表示心臟功能異常",
            "若出現相關症狀，如：胸悶疼痛、呼吸困難、眩暈、心律改變等，請立即就醫，且每三個月需監測心臟功能",
            vec![],
        ),
        source(
            "3",
            "Vincristine",
            "輸入a表示神經肌肉症狀",
            "神經肌肉症狀：包括神經痛、四肢痛、麻木感、肌肉痛、步行困難、知覺異常、運動失調等，孩童最容易感受此副作用，通常一般在治療後 6 週消失，但偶爾會有停止治療後仍持續一段長期間之情形。",
            vec![],
        ),
        source(
            "4",
            "Prednisolone",
            "輸入a表示口腔、喉嚨痛",
            "藥物可能導致口腔、喉嚨痛，若出現此症狀請告知醫護人員，並且避免食用刺激口腔和喉嚨的食物，盡量多喝水",
            vec![],
        ),
    ]
}
