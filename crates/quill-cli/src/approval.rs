//! Interactive approval of shell directives.

use async_trait::async_trait;
use quill_agent::{ApprovalChoice, Approver, Risk};

use crate::ui::{self, Activity, Ui};

const CHOICES: &str = "Run? [n]o/[y]es once/[s]afe auto/[a]ll auto: ";

/// Asks on the terminal before a model-requested command runs.
pub struct TerminalApprover {
    ui: Ui,
}

impl TerminalApprover {
    pub fn new(ui: Ui) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl Approver for TerminalApprover {
    async fn choose(&self, _command: &str, risk: Risk) -> ApprovalChoice {
        if let Risk::Dangerous(reason) = risk {
            let warning = format!("Warning: potentially destructive command ({})", reason);
            self.ui.println(&self.ui.paint(self.ui.theme().error_style(), &warning));
        }
        self.ui.set_activity(Activity::Waiting);
        let answer = ui::ask(&format!("\x07{}", CHOICES)).await;
        self.ui.set_activity(Activity::Working);
        parse_choice(&answer)
    }
}

/// Anything unrecognized, including an empty answer, denies.
pub fn parse_choice(answer: &str) -> ApprovalChoice {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => ApprovalChoice::Once,
        "s" | "safe" => ApprovalChoice::EnableSafe,
        "a" | "all" => ApprovalChoice::EnableAll,
        _ => ApprovalChoice::Deny,
    }
}
