use shared::{
    domain::{BoardState, SubmitStatus, WalletStatus},
    error::BoardError,
    protocol::APP_NAME,
};

pub const UPDATED_NOTICE: &str = "Message updated successfully!";

pub fn render_header(wallet: &WalletStatus) -> String {
    format!("== {APP_NAME} ==  [{}]", wallet.header_label())
}

pub fn render_board(state: &BoardState, loaded: bool) -> String {
    format!(
        "Current Message ({})\n  {}\n  Author: {}",
        state.count_badge(),
        state.display_message(loaded),
        state.display_author()
    )
}

pub fn render_status(status: &SubmitStatus) -> String {
    match status {
        SubmitStatus::Idle => "ready".to_string(),
        SubmitStatus::Submitting => "Updating... (waiting for wallet)".to_string(),
        SubmitStatus::Confirming => "Updating... (waiting for confirmation)".to_string(),
        SubmitStatus::Error(reason) => format!("last update failed: {reason}"),
    }
}

pub fn render_error(err: &BoardError) -> String {
    format!("error: {}", err.user_message())
}
