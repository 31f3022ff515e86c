use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::question::{Question, QuestionKind};
use crate::models::Quiz;

/// One submitted answer. The wire form is untagged: an option index for
/// multiple-choice/true-false, free text for short-answer, an array of
/// per-blank entries for fill-in-blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Blanks(Vec<Option<String>>),
    Text(String),
}

/// Per-slot shape information the sheet enforces on its setters.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SlotKind {
    Choice { options: usize },
    Text,
    Blanks { count: usize },
}

/// Accumulates one answer per question index for the active attempt draft.
/// An unanswered slot holds the `None` sentinel, which is distinct from an
/// answered-empty string: scoring must tell "skipped" from "answered empty".
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    slots: Vec<Option<Answer>>,
    kinds: Vec<SlotKind>,
}

impl AnswerSheet {
    pub fn for_quiz(quiz: &Quiz) -> Self {
        let kinds = quiz.questions.iter().map(slot_kind).collect::<Vec<_>>();
        Self {
            slots: vec![None; kinds.len()],
            kinds,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clear every slot back to the sentinel (retake).
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Record an option index for a multiple-choice or true-false question.
    /// Overwrites any prior value.
    pub fn set_choice(&mut self, index: usize, option_index: usize) -> Result<(), EngineError> {
        match self.kind(index)? {
            SlotKind::Choice { options } => {
                if option_index >= options {
                    return Err(EngineError::IndexOutOfRange {
                        index: option_index,
                        len: options,
                    });
                }
                self.slots[index] = Some(Answer::Choice(option_index));
                Ok(())
            }
            _ => Err(EngineError::AnswerMismatch { index }),
        }
    }

    /// Record free text for a short-answer question. Surrounding whitespace
    /// is trimmed before storage; a trimmed-empty string is still "answered".
    pub fn set_text(&mut self, index: usize, text: &str) -> Result<(), EngineError> {
        match self.kind(index)? {
            SlotKind::Text => {
                self.slots[index] = Some(Answer::Text(text.trim().to_string()));
                Ok(())
            }
            _ => Err(EngineError::AnswerMismatch { index }),
        }
    }

    /// Record one blank of a fill-in-blank question. The per-blank vector is
    /// lazily initialized to the question's blank count.
    pub fn set_blank(
        &mut self,
        index: usize,
        blank_index: usize,
        text: &str,
    ) -> Result<(), EngineError> {
        match self.kind(index)? {
            SlotKind::Blanks { count } => {
                if blank_index >= count {
                    return Err(EngineError::IndexOutOfRange {
                        index: blank_index,
                        len: count,
                    });
                }
                let slot = &mut self.slots[index];
                if !matches!(slot, Some(Answer::Blanks(_))) {
                    *slot = Some(Answer::Blanks(vec![None; count]));
                }
                if let Some(Answer::Blanks(blanks)) = slot {
                    blanks[blank_index] = Some(text.trim().to_string());
                }
                Ok(())
            }
            _ => Err(EngineError::AnswerMismatch { index }),
        }
    }

    /// True iff the slot is not the sentinel. For fill-in-blank, "answered"
    /// means at least one blank is filled; full completeness is a
    /// submission-time concern, not a collector concern.
    pub fn is_answered(&self, index: usize) -> bool {
        match self.slots.get(index) {
            Some(Some(Answer::Blanks(blanks))) => blanks.iter().any(Option::is_some),
            Some(Some(_)) => true,
            _ => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Answer> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn answered_count(&self) -> usize {
        (0..self.slots.len()).filter(|i| self.is_answered(*i)).count()
    }

    /// Answered-only (index, answer) pairs, in question order. This is what
    /// the grading coordinator serializes; sentinel slots are skipped.
    pub fn answered_entries(&self) -> impl Iterator<Item = (usize, &Answer)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_answered(*i))
            .filter_map(|(i, slot)| slot.as_ref().map(|a| (i, a)))
    }

    /// Full slot snapshot (sentinels included) for storing on an attempt.
    pub fn snapshot(&self) -> Vec<Option<Answer>> {
        self.slots.clone()
    }

    fn kind(&self, index: usize) -> Result<SlotKind, EngineError> {
        self.kinds
            .get(index)
            .copied()
            .ok_or(EngineError::IndexOutOfRange {
                index,
                len: self.kinds.len(),
            })
    }
}

fn slot_kind(question: &Question) -> SlotKind {
    match &question.kind {
        QuestionKind::MultipleChoice { options, .. } => SlotKind::Choice {
            options: options.len(),
        },
        // True/false renders as two fixed options: index 0 = true.
        QuestionKind::TrueFalse { .. } => SlotKind::Choice { options: 2 },
        QuestionKind::ShortAnswer => SlotKind::Text,
        QuestionKind::FillInBlank { blanks, .. } => SlotKind::Blanks { count: *blanks },
    }
}
