use std::time::SystemTime;

use anyhow::Error;
use chrono::{DateTime, Local, SubsecRound};
use cli_table::format::{Justify, Separator};
use cli_table::{Cell, CellStruct, Color, ColorChoice, Style, Table, TableStruct, print_stdout};
use colored::Colorize;
use convergence::{ConvergenceResult, SessionState, TimeSeries};
use humantime::format_duration;

use crate::client::output::outputs::Output;
use crate::diagnose::{BootstrapReport, FailureRecord};
use crate::monitor::PhaseResult;

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

fn state_cell(state: SessionState) -> CellStruct {
    let color = match state {
        SessionState::Running => Color::Yellow,
        SessionState::Converged => Color::Green,
        SessionState::TimedOut => Color::Red,
    };
    state.to_string().cell().foreground_color(Some(color))
}

fn format_time(time: SystemTime) -> String {
    let time: DateTime<Local> = time.into();
    time.round_subsecs(0).to_string()
}

/// Renders a transition log as `count@offset` entries.
fn format_transitions(series: &TimeSeries) -> String {
    if series.is_empty() {
        return "<no samples>".to_string();
    }
    series
        .samples()
        .iter()
        .map(|sample| {
            format!(
                "{}@{}",
                sample.count,
                format_duration(std::time::Duration::from_secs(sample.elapsed.as_secs()))
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn convergence_rows(target: u64, result: &ConvergenceResult) -> Vec<Vec<CellStruct>> {
    let failed = result.failed_samples();
    vec![
        vec!["State".cell().bold(true), state_cell(result.state())],
        vec!["Target".cell().bold(true), target.cell()],
        vec![
            "Capacity".cell().bold(true),
            format_transitions(result.capacity()).cell(),
        ],
        vec![
            "Membership".cell().bold(true),
            format_transitions(result.membership()).cell(),
        ],
        vec![
            "Duration".cell().bold(true),
            format_duration(std::time::Duration::from_secs(result.elapsed().as_secs()))
                .to_string()
                .cell(),
        ],
        vec!["Ticks".cell().bold(true), result.ticks().cell()],
        vec![
            "Failed samples".cell().bold(true),
            format!(
                "capacity: {}, membership: {}",
                failed.capacity, failed.membership
            )
            .cell(),
        ],
        vec![
            "Finished at".cell().bold(true),
            format_time(result.end_time()).cell(),
        ],
    ]
}

impl Output for CliOutput {
    fn print_convergence_result(&self, cluster: &str, target: u64, result: &ConvergenceResult) {
        let mut rows = vec![vec!["Cluster".cell().bold(true), cluster.cell()]];
        rows.extend(convergence_rows(target, result));
        self.print_vertical_table(rows);
    }

    fn print_scaling_test(&self, cluster: &str, phases: &[PhaseResult]) {
        let rows: Vec<_> = phases
            .iter()
            .enumerate()
            .map(|(index, phase)| {
                vec![
                    (index + 1).cell().justify(Justify::Right),
                    phase.target.cell().justify(Justify::Right),
                    state_cell(phase.result.state()),
                    phase.result.capacity().to_string().cell(),
                    phase.result.membership().to_string().cell(),
                    format_duration(std::time::Duration::from_secs(
                        phase.result.elapsed().as_secs(),
                    ))
                    .to_string()
                    .cell(),
                    phase
                        .bootstrap_errors
                        .as_ref()
                        .map(|report| report.written.len() + report.already_collected.len())
                        .unwrap_or(0)
                        .cell(),
                ]
            })
            .collect();
        println!("Scaling test of cluster {}", cluster.bold());
        self.print_horizontal_table(
            rows,
            vec![
                "Phase".cell().bold(true),
                "Target".cell().bold(true),
                "State".cell().bold(true),
                "Capacity".cell().bold(true),
                "Membership".cell().bold(true),
                "Duration".cell().bold(true),
                "Bootstrap errors".cell().bold(true),
            ],
        );
    }

    fn print_failure(
        &self,
        cluster: &str,
        failure: Option<&FailureRecord>,
        raw_reason: Option<&str>,
    ) {
        match failure {
            None => println!(
                "No failed wait condition found for cluster {cluster}. {}",
                "This does not mean that the cluster is healthy.".yellow()
            ),
            Some(failure) => {
                let mut rows = vec![
                    vec!["Cluster".cell().bold(true), cluster.cell()],
                    vec![
                        "Failure code".cell().bold(true),
                        failure
                            .failure_code
                            .to_string()
                            .cell()
                            .foreground_color(Some(Color::Red)),
                    ],
                    vec![
                        "Failure reason".cell().bold(true),
                        failure.failure_reason.as_str().cell(),
                    ],
                ];
                if let Some(resource) = &failure.affected_resource {
                    rows.push(vec![
                        "Affected resource".cell().bold(true),
                        resource.as_str().cell(),
                    ]);
                }
                if let Some(raw_reason) = raw_reason {
                    rows.push(vec!["Raw reason".cell().bold(true), raw_reason.cell()]);
                }
                self.print_vertical_table(rows);
            }
        }
    }

    fn print_bootstrap_report(&self, cluster: &str, report: &BootstrapReport) {
        if report.is_empty() {
            println!("No bootstrap errors found for cluster {cluster}");
            return;
        }
        let mut rows: Vec<_> = report
            .written
            .iter()
            .map(|log| {
                vec![
                    log.ip_address.as_str().cell(),
                    log.instance_id.as_str().cell(),
                    "collected".green().to_string().cell(),
                    log.path.display().to_string().cell(),
                ]
            })
            .collect();
        rows.extend(report.already_collected.iter().map(|ip| {
            vec![
                ip.as_str().cell(),
                "".cell(),
                "already collected".cell(),
                "".cell(),
            ]
        }));
        rows.extend(report.unresolved.iter().map(|ip| {
            vec![
                ip.as_str().cell(),
                "".cell(),
                "instance not found".yellow().to_string().cell(),
                "".cell(),
            ]
        }));
        self.print_horizontal_table(
            rows,
            vec![
                "IP address".cell().bold(true),
                "Instance".cell().bold(true),
                "Status".cell().bold(true),
                "Log file".cell().bold(true),
            ],
        );
    }

    fn print_error(&self, error: Error) {
        eprintln!("{error:?}");
    }
}
