use crate::interfaces::board_interface::{BoardState, RaceCard};
use std::fmt::Write;

/// format_board renders the board as plain text, one line per race.
pub fn format_board(board: &BoardState) -> String {
    let mut out = String::new();

    // header line with time and pagination
    let generated_at = board
        .generated_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_owned());

    let header = match &board.pagination {
        Some(p) => format!(
            "NEXT TO GO ({}) - page {}/{} - {} shown, {} held, {} expiring",
            generated_at,
            p.current_page,
            p.total_pages.max(1),
            p.total_items,
            board.held_races,
            board.expiring_races
        ),
        None => format!("NEXT TO GO ({})", generated_at),
    };
    writeln!(out, "{}", header).unwrap_or_default();

    if board.cards.is_empty() {
        writeln!(out, "  no races to show").unwrap_or_default();
    }

    for card in board.cards.iter() {
        writeln!(out, "{}", format_card(card)).unwrap_or_default();
    }

    if let Some(error) = &board.last_error {
        writeln!(out, "  ! {}", error).unwrap_or_default();
    }

    out
}

fn format_card(card: &RaceCard) -> String {
    let race_no = card
        .race_number
        .map(|n| format!("R{}", n))
        .unwrap_or_else(|| "R?".to_owned());

    let category = card.category.map(|c| c.name()).unwrap_or("Unknown");

    let venue = if card.venue_state.is_empty() {
        card.meeting_name.to_owned()
    } else {
        format!("{} ({})", card.meeting_name, card.venue_state)
    };

    format!(
        "  {:>4} {:<28} {:<9} {:<8} {:>10}  [{}]",
        race_no,
        venue,
        category,
        card.race_class,
        card.full_display,
        card.status
    )
}
