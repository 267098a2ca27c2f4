//! Localized outbound message catalogue

use serde::{Deserialize, Serialize};

use super::report::format_shortest;

/// Language of outbound messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "mn")]
    Mongolian,
}

/// Labels used by the calculation report
#[derive(Debug, Clone, Copy)]
pub struct ReportLabels {
    pub title: &'static str,
    pub mean: &'static str,
    pub stddev: &'static str,
    pub std_error: &'static str,
    pub delta_stat: &'static str,
    pub delta_instr: &'static str,
    pub delta_combined: &'static str,
    pub delta_total: &'static str,
    pub without_instrument: &'static str,
    pub relative: &'static str,
    pub answer: &'static str,
}

const ENGLISH_LABELS: ReportLabels = ReportLabels {
    title: "📌 **Measurement error: results**",
    mean: "Mean x̄",
    stddev: "Sample standard deviation s",
    std_error: "Standard error of the mean s/√n",
    delta_stat: "Statistical absolute error Δ_stat",
    delta_instr: "Instrument error Δ_instr",
    delta_combined: "Combined absolute error Δ = √(Δ_stat² + Δ_instr²)",
    delta_total: "Total absolute error Δ",
    without_instrument: "(instrument error not included)",
    relative: "Relative error ε",
    answer: "✅ **Answer:**",
};

const MONGOLIAN_LABELS: ReportLabels = ReportLabels {
    title: "📌 **Хэмжилтийн алдаа – үр дүн**",
    mean: "Дундаж утга x̄",
    stddev: "Стандарт хазайлт s",
    std_error: "Дундажийн стандарт алдаа s/√n",
    delta_stat: "Статистик абсолют алдаа Δ_stat",
    delta_instr: "Багажийн алдаа Δ_instr",
    delta_combined: "Нийлмэл абсолют алдаа Δ = √(Δ_stat² + Δ_instr²)",
    delta_total: "Нийт абсолют алдаа Δ",
    without_instrument: "(багажийн алдааг оруулаагүй)",
    relative: "Харьцангуй алдаа ε",
    answer: "✅ **Хариу:**",
};

/// Outbound messages for one language
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages {
    language: Language,
}

impl Messages {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn no_measurements_found(&self) -> String {
        match self.language {
            Language::English => {
                "No numeric measurements found. Example: 10.1 10.2 10.0 10.3".to_string()
            }
            Language::Mongolian => {
                "Тоон хэмжилт олдсонгүй. Жишээ: 10.1 10.2 10.0 10.3".to_string()
            }
        }
    }

    /// Echo of the accepted measurement values
    pub fn measurements_accepted(&self, values: &[f64]) -> String {
        let list = values
            .iter()
            .map(|v| format_shortest(*v))
            .collect::<Vec<_>>()
            .join(", ");

        match self.language {
            Language::English => format!("Got it. {} measurements: {}", values.len(), list),
            Language::Mongolian => format!("Ойлголоо. {} хэмжилт: {}", values.len(), list),
        }
    }

    /// `value` is already formatted
    pub fn instrument_accepted(&self, value: &str) -> String {
        match self.language {
            Language::English => format!("Instrument absolute error Δ_instr = {}", value),
            Language::Mongolian => format!("Багажийн абсолют алдаа Δ_instr = {}", value),
        }
    }

    pub fn instrument_prompt(&self) -> String {
        match self.language {
            Language::English => {
                "Please enter the instrument error (or 'skip').".to_string()
            }
            Language::Mongolian => {
                "Багажийн алдааг оруулна уу (эсвэл 'алгас').".to_string()
            }
        }
    }

    pub fn instrument_skipped(&self) -> String {
        match self.language {
            Language::English => "Instrument error skipped.".to_string(),
            Language::Mongolian => "Багажийн алдааг алгаслаа.".to_string(),
        }
    }

    pub fn instrument_not_found(&self) -> String {
        match self.language {
            Language::English => {
                "No numeric instrument error found. Example: 0.01".to_string()
            }
            Language::Mongolian => {
                "Багажийн алдааны тоо олдсонгүй. Жишээ: 0.01".to_string()
            }
        }
    }

    pub fn calculating(&self) -> String {
        match self.language {
            Language::English => "Starting the calculation…".to_string(),
            Language::Mongolian => "Тооцооллыг эхлүүлж байна…".to_string(),
        }
    }

    pub fn no_measurement_data(&self) -> String {
        match self.language {
            Language::English => {
                "There is no measurement data. Send your measurements first (e.g. 10.1 10.2 10.0 10.3)."
                    .to_string()
            }
            Language::Mongolian => {
                "Хэмжилтийн утга алга байна. Эхлээд хэмжилтүүдээ явуулна уу (ж: 10.1 10.2 10.0 10.3)."
                    .to_string()
            }
        }
    }

    pub fn storage_warning(&self, detail: &str) -> String {
        match self.language {
            Language::English => format!("⚠️ The run could not be saved: {}", detail),
            Language::Mongolian => format!("⚠️ DB алдаа: {}", detail),
        }
    }

    pub fn reset_done(&self) -> String {
        match self.language {
            Language::English => "Started a new calculation ✅".to_string(),
            Language::Mongolian => "Шинэ тооцоолол эхэллээ ✅".to_string(),
        }
    }

    pub fn help(&self) -> String {
        match self.language {
            Language::English => "Send your measurements, e.g. 10.1 10.2 10.0 10.3\n\
                 Add the instrument error in the same message (\"instrument 0.01\") \
                 or send it when asked. Send 'skip' to leave it out.\n\
                 /reset - start a new calculation"
                .to_string(),
            Language::Mongolian => "Хэмжилтүүдээ явуулна уу, ж: 10.1 10.2 10.0 10.3\n\
                 Багажийн алдааг хамт бичиж болно (\"багажийн алдаа 0.01\") \
                 эсвэл асуухад явуулна. Алгасах бол 'алгас' гэж бичнэ.\n\
                 /reset - шинэ тооцоо эхлүүлэх"
                .to_string(),
        }
    }

    pub fn labels(&self) -> &'static ReportLabels {
        match self.language {
            Language::English => &ENGLISH_LABELS,
            Language::Mongolian => &MONGOLIAN_LABELS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurements_echo() {
        let messages = Messages::new(Language::English);
        let text = messages.measurements_accepted(&[10.1, 10.0]);
        assert_eq!(text, "Got it. 2 measurements: 10.1, 10.0");

        let text = messages.measurements_accepted(&[1e16, 0.00001, -3.0]);
        assert_eq!(text, "Got it. 3 measurements: 1e+16, 1e-05, -3.0");
    }

    #[test]
    fn test_language_serialization() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            language: Language,
        }

        let parsed: Wrapper = toml::from_str("language = \"mn\"").unwrap();
        assert_eq!(parsed.language, Language::Mongolian);

        let text = toml::to_string(&Wrapper {
            language: Language::English,
        })
        .unwrap();
        assert!(text.contains("\"en\""));
    }

    #[test]
    fn test_catalogues_differ() {
        let en = Messages::new(Language::English);
        let mn = Messages::new(Language::Mongolian);
        assert_ne!(en.reset_done(), mn.reset_done());
        assert_ne!(en.labels().title, mn.labels().title);
    }
}
