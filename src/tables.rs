use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        selector::{Action, ScheduleDecision},
        series::PriceSeries,
    },
    quantity::rate::MegawattHourRate,
};

const fn action_color(action: Action) -> Color {
    match action {
        Action::Charge => Color::Green,
        Action::Discharge => Color::Red,
        Action::Idle => Color::Reset,
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

pub fn build_prices_table(series: &PriceSeries, decision: &ScheduleDecision) -> Table {
    let median_price = MegawattHourRate::median(series.iter().map(|point| point.price))
        .unwrap_or(MegawattHourRate::ZERO);

    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "End", "Price", "Action"]);
    for point in series.iter() {
        let interval = point.interval();
        let action = decision.action_at(point.time);
        table.add_row(vec![
            Cell::new(interval.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(interval.start.format("%H:%M")),
            Cell::new(interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(point.price).set_alignment(CellAlignment::Right).fg(
                if point.price >= median_price { Color::Red } else { Color::Green },
            ),
            Cell::new(action).fg(action_color(action)),
        ]);
    }
    table
}

pub fn build_decision_table(decision: &ScheduleDecision) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Action", "Start", "End", "Hours"]);
    let blocks = decision
        .charge_blocks()
        .into_iter()
        .map(|block| (Action::Charge, block))
        .chain(decision.discharge_blocks().into_iter().map(|block| (Action::Discharge, block)));
    for (action, block) in blocks {
        table.add_row(vec![
            Cell::new(action).fg(action_color(action)),
            Cell::new(block.start.format("%b %d %H:%M")),
            Cell::new(block.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(block.duration().num_hours()).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
