use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// A question put to every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub text: Option<String>,
    /// Answer time limit in seconds.
    #[serde(default)]
    pub time: Option<u32>,
}

impl Question {
    pub fn has_text(&self) -> bool {
        self.text.as_deref().map_or(false, |text| !text.is_empty())
    }

    /// Both the text and the time limit are set.
    pub fn is_complete(&self) -> bool {
        self.has_text() && self.time.is_some()
    }
}

/// The election's questions, indexed densely from zero.
///
/// Stored as a map from index (`"0"`, `"1"`, ...) to question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Question>")]
pub struct Questions(Vec<Question>);

/// A stored question map that doesn't describe a dense list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionIndexError {
    #[error("question key {0:?} is not an index")]
    NotAnIndex(String),
    #[error("question {0} appears more than once")]
    Duplicate(usize),
    #[error("question {0} is missing")]
    Missing(usize),
}

impl Questions {
    pub fn new(questions: Vec<Question>) -> Self {
        Self(questions)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.0.iter()
    }

    /// No question without text comes before one with text, so all the
    /// empty questions sit together at the end.
    pub fn is_block_ordered(&self) -> bool {
        let first_empty = self.0.iter().position(|q| !q.has_text());
        let last_filled = self.0.iter().rposition(Question::has_text);
        match (first_empty, last_filled) {
            (Some(empty), Some(filled)) => empty > filled,
            _ => true,
        }
    }

    /// Every question has both text and a time limit. Vacuously true when
    /// there are no questions.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Question::is_complete)
    }

    /// Another blank question may be appended.
    pub fn can_add_question(&self) -> bool {
        self.is_empty() || self.is_complete()
    }

    /// Append a blank question at the next index, if allowed.
    pub fn add_question(&mut self) -> Option<usize> {
        if !self.can_add_question() {
            return None;
        }
        self.0.push(Question {
            text: Some(String::new()),
            time: None,
        });
        Some(self.0.len() - 1)
    }

    /// The question set may be submitted: it is unlocked, has at least one
    /// question, is complete and is block ordered.
    pub fn can_submit(&self, locked: bool) -> bool {
        !locked && !self.is_empty() && self.is_complete() && self.is_block_ordered()
    }
}

impl TryFrom<BTreeMap<String, Question>> for Questions {
    type Error = QuestionIndexError;

    fn try_from(indexed: BTreeMap<String, Question>) -> Result<Self, Self::Error> {
        let mut by_index = BTreeMap::new();
        for (key, question) in indexed {
            let index: usize = key
                .parse()
                .map_err(|_| QuestionIndexError::NotAnIndex(key.clone()))?;
            if by_index.insert(index, question).is_some() {
                return Err(QuestionIndexError::Duplicate(index));
            }
        }
        if let Some((missing, _)) = by_index
            .keys()
            .enumerate()
            .find(|(expected, index)| expected != *index)
        {
            return Err(QuestionIndexError::Missing(missing));
        }
        Ok(Self(by_index.into_values().collect()))
    }
}

impl Serialize for Questions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .enumerate()
                .map(|(index, question)| (index.to_string(), question)),
        )
    }
}

impl From<Vec<Question>> for Questions {
    fn from(questions: Vec<Question>) -> Self {
        Self(questions)
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Question {
        pub fn example(text: &str, time: Option<u32>) -> Self {
            Self {
                text: Some(text.to_string()),
                time,
            }
        }
    }

    impl Questions {
        pub fn example() -> Self {
            vec![
                Question::example("What is your top priority?", Some(60)),
                Question::example("How will you fund it?", Some(90)),
            ]
            .into()
        }

        pub fn texts(texts: &[&str]) -> Self {
            texts
                .iter()
                .map(|text| Question::example(text, None))
                .collect::<Vec<_>>()
                .into()
        }
    }
}
