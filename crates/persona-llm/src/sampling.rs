//! Per-operation sampling parameters (§4.3 table).

#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PersonaBatch,
    Feedback,
    ThemeAggregation,
}

impl Operation {
    pub fn sampling(self) -> Sampling {
        match self {
            Operation::PersonaBatch => Sampling {
                temperature: 0.7,
                top_p: 0.95,
                frequency_penalty: Some(0.2),
                presence_penalty: Some(0.1),
                max_tokens: 4000,
            },
            Operation::Feedback => Sampling {
                temperature: 0.6,
                top_p: 0.90,
                frequency_penalty: None,
                presence_penalty: None,
                max_tokens: 1500,
            },
            Operation::ThemeAggregation => Sampling {
                temperature: 0.5,
                top_p: 0.85,
                frequency_penalty: None,
                presence_penalty: None,
                max_tokens: 1000,
            },
        }
    }
}
