//! Free-form Q&A: conversation handling and detection of what a question is about.

use crate::error::{InsightError, Result};
use crate::llm::prompts::QuestionContext;
use crate::llm::types::{ChatMessage, ChatRole};
use crate::schema::Topic;
use crate::utils::{contains_phrase, normalize_phrase};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Conversation turns forwarded to the completion service ahead of the question.
pub const MAX_HISTORY_TURNS: usize = 10;

pub const MIN_DETECTED_YEAR: i32 = 2000;
pub const MAX_DETECTED_YEAR: i32 = 2100;

const INTERNET_TERMS: &[&str] = &[
    "internet",
    "network",
    "broadband",
    "wifi",
    "mang internet",
    "truy cap mang",
];

const URBAN_RURAL_TERMS: &[&str] = &[
    "urban",
    "rural",
    "city",
    "countryside",
    "thanh thi",
    "nong thon",
    "do thi",
];

/// Provinces and centrally-run cities with the spellings users type for them.
/// Order matters: the first entry with a matching alias wins.
const PROVINCES: &[(&str, &[&str])] = &[
    ("Hà Nội", &["ha noi", "hanoi"]),
    ("Hồ Chí Minh", &["ho chi minh", "tp hcm", "hcm", "hcmc", "sai gon", "saigon"]),
    ("Hải Phòng", &["hai phong", "haiphong"]),
    ("Đà Nẵng", &["da nang", "danang"]),
    ("Cần Thơ", &["can tho", "cantho"]),
    ("An Giang", &["an giang"]),
    ("Bà Rịa - Vũng Tàu", &["ba ria vung tau", "vung tau", "ba ria"]),
    ("Bạc Liêu", &["bac lieu"]),
    ("Bắc Giang", &["bac giang"]),
    ("Bắc Kạn", &["bac kan", "bac can"]),
    ("Bắc Ninh", &["bac ninh"]),
    ("Bến Tre", &["ben tre"]),
    ("Bình Dương", &["binh duong"]),
    ("Bình Định", &["binh dinh"]),
    ("Bình Phước", &["binh phuoc"]),
    ("Bình Thuận", &["binh thuan"]),
    ("Cà Mau", &["ca mau"]),
    ("Cao Bằng", &["cao bang"]),
    ("Đắk Lắk", &["dak lak", "daklak", "dac lac"]),
    ("Đắk Nông", &["dak nong"]),
    ("Điện Biên", &["dien bien"]),
    ("Đồng Nai", &["dong nai"]),
    ("Đồng Tháp", &["dong thap"]),
    ("Gia Lai", &["gia lai"]),
    ("Hà Giang", &["ha giang"]),
    ("Hà Nam", &["ha nam"]),
    ("Hà Tĩnh", &["ha tinh"]),
    ("Hải Dương", &["hai duong"]),
    ("Hậu Giang", &["hau giang"]),
    ("Hòa Bình", &["hoa binh"]),
    ("Hưng Yên", &["hung yen"]),
    ("Khánh Hòa", &["khanh hoa", "nha trang"]),
    ("Kiên Giang", &["kien giang"]),
    ("Kon Tum", &["kon tum"]),
    ("Lai Châu", &["lai chau"]),
    ("Lâm Đồng", &["lam dong", "da lat", "dalat"]),
    ("Lạng Sơn", &["lang son"]),
    ("Lào Cai", &["lao cai"]),
    ("Long An", &["long an"]),
    ("Nam Định", &["nam dinh"]),
    ("Nghệ An", &["nghe an"]),
    ("Ninh Bình", &["ninh binh"]),
    ("Ninh Thuận", &["ninh thuan"]),
    ("Phú Thọ", &["phu tho"]),
    ("Phú Yên", &["phu yen"]),
    ("Quảng Bình", &["quang binh"]),
    ("Quảng Nam", &["quang nam"]),
    ("Quảng Ngãi", &["quang ngai"]),
    ("Quảng Ninh", &["quang ninh", "ha long"]),
    ("Quảng Trị", &["quang tri"]),
    ("Sóc Trăng", &["soc trang"]),
    ("Sơn La", &["son la"]),
    ("Tây Ninh", &["tay ninh"]),
    ("Thái Bình", &["thai binh"]),
    ("Thái Nguyên", &["thai nguyen"]),
    ("Thanh Hóa", &["thanh hoa"]),
    ("Thừa Thiên Huế", &["thua thien hue", "hue"]),
    ("Tiền Giang", &["tien giang"]),
    ("Trà Vinh", &["tra vinh"]),
    ("Tuyên Quang", &["tuyen quang"]),
    ("Vĩnh Long", &["vinh long"]),
    ("Vĩnh Phúc", &["vinh phuc"]),
    ("Yên Bái", &["yen bai"]),
];

static YEAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}\b").expect("year pattern is valid"));

fn mentions_any(normalized: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_phrase(normalized, term))
}

pub fn detect_topic(question: &str) -> Topic {
    let normalized = normalize_phrase(question);
    if mentions_any(&normalized, INTERNET_TERMS) {
        Topic::InternetAccess
    } else if mentions_any(&normalized, URBAN_RURAL_TERMS) {
        Topic::UrbanRural
    } else {
        Topic::Population
    }
}

/// Canonical province name mentioned in `question`, or `None` for a nationwide question.
pub fn detect_region(question: &str) -> Option<&'static str> {
    let normalized = normalize_phrase(question);
    PROVINCES
        .iter()
        .find(|(name, aliases)| {
            contains_phrase(&normalized, &normalize_phrase(name))
                || aliases.iter().any(|alias| contains_phrase(&normalized, alias))
        })
        .map(|(name, _)| *name)
}

pub fn detect_year(question: &str) -> Option<i32> {
    YEAR_TOKEN
        .find_iter(question)
        .filter_map(|token| token.as_str().parse::<i32>().ok())
        .find(|year| (MIN_DETECTED_YEAR..=MAX_DETECTED_YEAR).contains(year))
}

/// Detects topic, region and year; `default_year` applies when the question names none.
pub fn analyze_question(question: &str, default_year: i32) -> QuestionContext {
    QuestionContext {
        question: question.trim().to_string(),
        topic: detect_topic(question),
        region: detect_region(question).map(str::to_string),
        year: detect_year(question).unwrap_or(default_year),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Splits the conversation into the latest user question and the turns
    /// before it, keeping at most [`MAX_HISTORY_TURNS`] user/assistant turns.
    pub fn split_latest(&self) -> Result<(&str, Vec<ChatMessage>)> {
        let latest = self
            .messages
            .iter()
            .rposition(|message| {
                message.role == ChatRole::User && !message.content.trim().is_empty()
            })
            .ok_or_else(|| {
                InsightError::validation("at least one non-empty user message is required")
            })?;

        let earlier: Vec<ChatMessage> = self.messages[..latest]
            .iter()
            .filter(|message| {
                message.role != ChatRole::System && !message.content.trim().is_empty()
            })
            .cloned()
            .collect();
        let skip = earlier.len().saturating_sub(MAX_HISTORY_TURNS);
        let history = earlier.into_iter().skip(skip).collect();

        Ok((self.messages[latest].content.as_str(), history))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub topic: Topic,
    pub year: i32,
}
