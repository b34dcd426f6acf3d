//! 結果画面のフィードバック（5段階評価、1回のみ）

pub const THANKS_MESSAGE: &str = "Thanks for your feedback!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Unsatisfied = 1,
    Neutral = 2,
    Satisfied = 3,
    Happy = 4,
    VeryHappy = 5,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::Unsatisfied,
        Rating::Neutral,
        Rating::Satisfied,
        Rating::Happy,
        Rating::VeryHappy,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.value() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Unsatisfied => "Unsatisfied",
            Rating::Neutral => "Neutral",
            Rating::Satisfied => "Satisfied",
            Rating::Happy => "Happy",
            Rating::VeryHappy => "Very Happy",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Rating::Unsatisfied => "😞",
            Rating::Neutral => "😐",
            Rating::Satisfied => "🙂",
            Rating::Happy => "😊",
            Rating::VeryHappy => "😃",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FeedbackState {
    #[default]
    Waiting,
    Submitted(Rating),
}

#[derive(Debug, Default)]
pub struct FeedbackSection {
    state: FeedbackState,
}

impl FeedbackSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 評価を送信。2回目以降は無視して false を返す
    pub fn submit(&mut self, rating: Rating) -> bool {
        match self.state {
            FeedbackState::Waiting => {
                self.state = FeedbackState::Submitted(rating);
                true
            }
            FeedbackState::Submitted(_) => false,
        }
    }

    pub fn rating(&self) -> Option<Rating> {
        match self.state {
            FeedbackState::Waiting => None,
            FeedbackState::Submitted(rating) => Some(rating),
        }
    }
}
