use chrono::{DateTime, Local, Utc};
use cli_table::format::{Justify, Separator};
use cli_table::{Cell, CellStruct, Color, ColorChoice, Style, Table, TableStruct, print_stdout};
use serde_json::json;

use crate::common::cli::OutputMode;
use crate::reservation::Reservation;

pub trait Output {
    fn print_reservation_list(&self, reservations: Vec<Reservation>);
    fn print_reservation_detail(&self, reservation: Reservation);
    fn print_error(&self, error: anyhow::Error);
}

pub fn create_output(mode: OutputMode, color_policy: ColorChoice) -> Box<dyn Output> {
    match mode {
        OutputMode::Cli => Box::new(CliOutput::new(color_policy)),
        OutputMode::Json => Box::<JsonOutput>::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationState {
    Pending,
    Active,
    Ended,
}

impl ReservationState {
    fn at(reservation: &Reservation, now: DateTime<Utc>) -> Self {
        if reservation.has_ended_at(now) {
            ReservationState::Ended
        } else if reservation.has_started_at(now) {
            ReservationState::Active
        } else {
            ReservationState::Pending
        }
    }

    fn cell(self) -> CellStruct {
        match self {
            ReservationState::Pending => "PENDING".cell().foreground_color(Some(Color::Cyan)),
            ReservationState::Active => "ACTIVE".cell().foreground_color(Some(Color::Green)),
            ReservationState::Ended => "ENDED".cell().foreground_color(Some(Color::Magenta)),
        }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn join_names<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub struct CliOutput {
    color_policy: ColorChoice,
}

impl CliOutput {
    pub fn new(color_policy: ColorChoice) -> CliOutput {
        CliOutput { color_policy }
    }

    fn print_vertical_table(&self, rows: Vec<Vec<CellStruct>>) {
        let table = rows.table().separator(
            Separator::builder()
                .column(Some(Default::default()))
                .build(),
        );
        self.print_table(table);
    }

    fn print_horizontal_table(&self, rows: Vec<Vec<CellStruct>>, header: Vec<CellStruct>) {
        let table = rows
            .table()
            .separator(
                Separator::builder()
                    .title(Some(Default::default()))
                    .column(Some(Default::default()))
                    .build(),
            )
            .title(header);
        self.print_table(table);
    }

    fn print_table(&self, table: TableStruct) {
        let table = table.color_choice(self.color_policy);
        if let Err(e) = print_stdout(table) {
            log::error!("Cannot print table to stdout: {:?}", e);
        }
    }
}

impl Output for CliOutput {
    fn print_reservation_list(&self, reservations: Vec<Reservation>) {
        let now = Utc::now();
        let rows: Vec<_> = reservations
            .iter()
            .map(|rsv| {
                vec![
                    rsv.id().cell(),
                    ReservationState::at(rsv, now).cell(),
                    format_time(rsv.start_time()).cell(),
                    format_time(rsv.end_time()).cell(),
                    rsv.nodes().len().cell().justify(Justify::Right),
                    rsv.free_nodes().count().cell().justify(Justify::Right),
                    join_names(rsv.users()).cell(),
                    join_names(rsv.groups()).cell(),
                ]
            })
            .collect();
        let header = vec![
            "ID".cell().bold(true),
            "State".cell().bold(true),
            "Start".cell().bold(true),
            "End".cell().bold(true),
            "Nodes".cell().bold(true),
            "Free".cell().bold(true),
            "Users".cell().bold(true),
            "Groups".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);
    }

    fn print_reservation_detail(&self, reservation: Reservation) {
        let rows = vec![
            vec!["ID".cell().bold(true), reservation.id().cell()],
            vec![
                "State".cell().bold(true),
                ReservationState::at(&reservation, Utc::now()).cell(),
            ],
            vec![
                "Start".cell().bold(true),
                format_time(reservation.start_time()).cell(),
            ],
            vec![
                "End".cell().bold(true),
                format_time(reservation.end_time()).cell(),
            ],
            vec![
                "Users".cell().bold(true),
                join_names(reservation.users()).cell(),
            ],
            vec![
                "Groups".cell().bold(true),
                join_names(reservation.groups()).cell(),
            ],
            vec![
                "Free nodes".cell().bold(true),
                format!(
                    "{}/{}",
                    reservation.free_nodes().count(),
                    reservation.nodes().len()
                )
                .cell(),
            ],
        ];
        self.print_vertical_table(rows);

        let rows: Vec<_> = reservation
            .nodes()
            .iter()
            .map(|node| {
                vec![
                    node.id().cell(),
                    node.ppn().cell().justify(Justify::Right),
                    node.ppn_used().cell().justify(Justify::Right),
                    if node.is_free() {
                        "yes".cell().foreground_color(Some(Color::Green))
                    } else {
                        "no".cell()
                    },
                    join_names(node.props()).cell(),
                    join_names(node.jobs()).cell(),
                ]
            })
            .collect();
        let header = vec![
            "Node".cell().bold(true),
            "Cores".cell().bold(true),
            "Used".cell().bold(true),
            "Free".cell().bold(true),
            "Properties".cell().bold(true),
            "Jobs".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);
    }

    fn print_error(&self, error: anyhow::Error) {
        eprintln!("{:?}", error);
    }
}

#[derive(Default)]
pub struct JsonOutput;

impl JsonOutput {
    fn print(&self, data: serde_json::Value) {
        println!("{data:#}");
    }
}

impl Output for JsonOutput {
    fn print_reservation_list(&self, reservations: Vec<Reservation>) {
        self.print(json!(reservations));
    }

    fn print_reservation_detail(&self, reservation: Reservation) {
        self.print(json!(reservation));
    }

    fn print_error(&self, error: anyhow::Error) {
        self.print(json!({ "error": format!("{error:?}") }));
    }
}
