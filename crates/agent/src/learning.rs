use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::evaluator::Evaluation;

pub const LEARNING_WINDOW: usize = 100;
const FOCUS_CATEGORIES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    MenuError,
    CartAwareness,
    Relevance,
    Format,
    Other,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MenuError => "MENU_ERROR",
            Self::CartAwareness => "CART_AWARENESS",
            Self::Relevance => "RELEVANCE",
            Self::Format => "FORMAT",
            Self::Other => "OTHER",
        }
    }

    pub fn categorize(feedback: &str) -> Self {
        let feedback = feedback.to_lowercase();
        if feedback.contains("menu") {
            Self::MenuError
        } else if feedback.contains("cart") {
            Self::CartAwareness
        } else if feedback.contains("relevan") || feedback.contains("empty reply") {
            Self::Relevance
        } else if feedback.contains("format") || feedback.contains("json") {
            Self::Format
        } else {
            Self::Other
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LearningInsights {
    pub total_evaluations: usize,
    pub pass_rate: f64,
    pub error_counts: BTreeMap<ErrorCategory, usize>,
}

#[derive(Default)]
struct LearningState {
    recent: VecDeque<(bool, Option<ErrorCategory>)>,
}

/// Process-wide record of recent evaluation outcomes. Only the focus line
/// derived from it reaches prompts.
#[derive(Default)]
pub struct LearningLog {
    state: Mutex<LearningState>,
}

impl LearningLog {
    pub fn record(&self, evaluation: &Evaluation) {
        let category = (!evaluation.pass).then(|| ErrorCategory::categorize(&evaluation.feedback));
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.recent.push_back((evaluation.pass, category));
        while state.recent.len() > LEARNING_WINDOW {
            state.recent.pop_front();
        }
    }

    pub fn insights(&self) -> LearningInsights {
        let Ok(state) = self.state.lock() else {
            return LearningInsights::default();
        };
        let mut error_counts = BTreeMap::new();
        for category in state.recent.iter().filter_map(|(_, category)| *category) {
            *error_counts.entry(category).or_insert(0) += 1;
        }
        let total_evaluations = state.recent.len();
        let passed = state.recent.iter().filter(|(pass, _)| *pass).count();
        LearningInsights {
            total_evaluations,
            pass_rate: passed as f64 / total_evaluations.max(1) as f64,
            error_counts,
        }
    }

    /// Most frequent failure categories, ties broken by category order.
    pub fn top_errors(&self) -> Vec<ErrorCategory> {
        let mut counts = self.insights().error_counts.into_iter().collect::<Vec<_>>();
        counts.sort_by(|(left_category, left), (right_category, right)| {
            right.cmp(left).then(left_category.cmp(right_category))
        });
        counts.into_iter().take(FOCUS_CATEGORIES).map(|(category, _)| category).collect()
    }

    pub fn focus(&self) -> Option<String> {
        let top = self.top_errors();
        if top.is_empty() {
            return None;
        }
        Some(format!(
            "Recent replies most often failed on: {}. Pay special attention to avoiding these issues.",
            top.iter().map(|category| category.as_str()).collect::<Vec<_>>().join(", ")
        ))
    }
}
