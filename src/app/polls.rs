//! Create, edit and delete, driven by the stepped dialog prompts.

use super::{App, DialogMode};
use livepoll::model::{PollDraft, PollEdit, PollId, MAX_OPTIONS, MIN_OPTIONS};
use livepoll::store::ChangeEvent;

/// What the expiry prompt accepted.
#[derive(Debug, PartialEq)]
enum ExpiryInput {
    Default,
    Never,
    Hours(i64),
}

fn parse_expiry(input: &str) -> Option<ExpiryInput> {
    match input.trim().to_lowercase().as_str() {
        "" => Some(ExpiryInput::Default),
        "0" | "never" | "none" => Some(ExpiryInput::Never),
        s => s.parse::<i64>().ok().filter(|h| *h > 0).map(ExpiryInput::Hours),
    }
}

impl App {
    /// Enter was pressed in a text prompt.
    pub async fn submit_dialog(&mut self) {
        let input = self.dialog.input_text.trim().to_string();
        match self.dialog.mode.clone() {
            DialogMode::None | DialogMode::ConfirmDelete { .. } => {}

            DialogMode::CreateQuestion => {
                if input.is_empty() {
                    self.set_status_error("Question cannot be empty".to_string());
                    return;
                }
                self.dialog.mode = DialogMode::CreateOption {
                    question: input,
                    options: Vec::new(),
                };
                self.dialog.input_text.clear();
            }

            DialogMode::CreateOption { question, mut options } => {
                if input.is_empty() {
                    if options.len() < MIN_OPTIONS {
                        self.set_status_error(format!("Add at least {} options", MIN_OPTIONS));
                        return;
                    }
                    self.begin_expiry_prompt(question, options);
                    return;
                }
                options.push(input);
                if options.len() == MAX_OPTIONS {
                    self.begin_expiry_prompt(question, options);
                } else {
                    self.dialog.mode = DialogMode::CreateOption { question, options };
                    self.dialog.input_text.clear();
                }
            }

            DialogMode::CreateExpiry { question, options } => {
                let Some(expiry) = parse_expiry(&input) else {
                    self.set_status_error("Expiry must be a number of hours, or 0 for none".to_string());
                    return;
                };
                let draft = match expiry {
                    ExpiryInput::Default => self.session.draft(question, options),
                    ExpiryInput::Never => Ok(PollDraft::new(question, options)),
                    ExpiryInput::Hours(h) => PollDraft::new(question, options).expires_in_hours(h),
                };
                let draft = match draft {
                    Ok(draft) => draft,
                    Err(e) => {
                        self.set_status_error(format!("Invalid expiry: {}", e));
                        return;
                    }
                };
                self.close_dialog();
                self.create_poll(draft).await;
            }

            DialogMode::EditQuestion { poll_id } => {
                if input.is_empty() {
                    self.set_status_error("Question cannot be empty".to_string());
                    return;
                }
                let Some(card) = self.cards.get(&poll_id) else {
                    self.close_dialog();
                    return;
                };
                let labels: Vec<String> = card.poll().options.iter().map(|o| o.label.clone()).collect();
                self.dialog.input_text = labels.first().cloned().unwrap_or_default();
                self.dialog.mode = DialogMode::EditLabel {
                    poll_id,
                    question: input,
                    labels,
                    index: 0,
                };
            }

            DialogMode::EditLabel {
                poll_id,
                question,
                mut labels,
                index,
            } => {
                if input.is_empty() {
                    self.set_status_error(format!("Option {} must have a label", index + 1));
                    return;
                }
                if let Some(label) = labels.get_mut(index) {
                    *label = input;
                }
                if index + 1 < labels.len() {
                    self.dialog.input_text = labels[index + 1].clone();
                    self.dialog.mode = DialogMode::EditLabel {
                        poll_id,
                        question,
                        labels,
                        index: index + 1,
                    };
                } else {
                    self.close_dialog();
                    self.edit_poll(&poll_id, question, labels).await;
                }
            }
        }
    }

    fn begin_expiry_prompt(&mut self, question: String, options: Vec<String>) {
        self.dialog.mode = DialogMode::CreateExpiry { question, options };
        self.dialog.input_text = self.config.polls.default_expiry_hours.to_string();
    }

    async fn create_poll(&mut self, draft: PollDraft) {
        match self.session.create_poll(&draft).await {
            Ok(poll) => {
                self.add_debug(format!("Created poll {}", poll.id));
                self.board.apply(ChangeEvent::Inserted(poll));
                self.sync_visible_cards().await;
                self.set_status_info("Poll created".to_string());
            }
            Err(e) => self.set_status_error(format!("Could not create poll: {}", e)),
        }
    }

    async fn edit_poll(&mut self, poll_id: &PollId, question: String, labels: Vec<String>) {
        let Some(current) = self.cards.get(poll_id).map(|c| c.poll().clone()) else {
            return;
        };
        let old_labels: Vec<&str> = current.options.iter().map(|o| o.label.as_str()).collect();
        let edit = PollEdit {
            question: (question != current.question).then_some(question),
            option_labels: (labels != old_labels).then_some(labels),
        };
        if edit.is_empty() {
            self.set_status_info("Nothing changed".to_string());
            return;
        }
        match self.session.edit_poll(&current, &edit).await {
            Ok(()) => self.set_status_info("Poll updated".to_string()),
            Err(e) => self.set_status_error(format!("Could not edit poll: {}", e)),
        }
    }

    pub async fn confirm_delete(&mut self) {
        let DialogMode::ConfirmDelete { poll_id, .. } = self.dialog.mode.clone() else {
            return;
        };
        self.close_dialog();
        match self.session.delete_poll(&poll_id).await {
            Ok(()) => {
                if let Some(mut card) = self.cards.remove(&poll_id) {
                    card.close();
                }
                self.board.apply(ChangeEvent::Deleted(poll_id));
                self.clamp_selection();
                self.set_status_info("Poll deleted".to_string());
            }
            Err(e) => self.set_status_error(format!("Could not delete poll: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::LaunchOptions;

    #[test]
    fn test_parse_expiry() {
        assert_eq!(parse_expiry(""), Some(ExpiryInput::Default));
        assert_eq!(parse_expiry("0"), Some(ExpiryInput::Never));
        assert_eq!(parse_expiry(" 48 "), Some(ExpiryInput::Hours(48)));
        assert_eq!(parse_expiry("-3"), None);
        assert_eq!(parse_expiry("soon"), None);
    }

    #[tokio::test]
    async fn test_huge_expiry_keeps_prompt_open() {
        let mut app = App::new(LaunchOptions {
            ephemeral: true,
            backend: None,
        })
        .await
        .unwrap();
        app.dialog.mode = DialogMode::CreateExpiry {
            question: "Tea?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
        };
        app.dialog.input_text = "10000000000".to_string();

        app.submit_dialog().await;

        assert!(matches!(app.dialog.mode, DialogMode::CreateExpiry { .. }));
        assert!(app.status_message.as_ref().is_some_and(|m| m.is_error));
        assert!(app.board.is_empty());
    }
}
