use super::App;
use livepoll::error::{PollError, VoteBlock};

impl App {
    /// Vote for `option` on the selected poll. The count moves now; the
    /// store's answer is settled in `poll_sync`.
    pub fn vote_selected(&mut self, option: usize) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let Some(card) = self.cards.get_mut(&id) else {
            self.set_status_error("Poll is still loading".to_string());
            return;
        };
        if option >= card.poll().options.len() {
            return;
        }

        match self.session.dispatch_vote(card, option, self.vote_tx.clone()) {
            Ok(celebration) => {
                let poll = card.poll().clone();
                self.board.refresh(&poll);
                self.celebrate(&id, celebration.option);
                self.add_debug(format!("Voting for option {} on {}", option + 1, id));
            }
            Err(PollError::VoteNotAllowed(block)) => {
                let msg = match block {
                    VoteBlock::AlreadyVoted => "You already voted on this poll",
                    VoteBlock::Expired => "This poll is closed",
                    VoteBlock::InFlight => "Your vote is still being counted",
                };
                self.set_status_info(msg.to_string());
            }
            Err(e) => self.set_status_error(format!("Vote failed: {}", e)),
        }
    }
}
