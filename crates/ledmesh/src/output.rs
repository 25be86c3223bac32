use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ledmesh_proto::{Node, Profile, State};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_state(state: &State, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(state),
        OutputFormat::Table => {
            println!("{}", nodes_table(state));
            println!("{}", profiles_table(state));
        }
        OutputFormat::Pretty => {
            for node in state.nodes.values() {
                println!("{}", node_line(node));
            }
            for profile in state.profiles.values() {
                println!("{}", profile_line(profile, state.is_active(&profile.id)));
            }
        }
        OutputFormat::Raw => {
            for node in state.nodes.values().filter(|node| node.connected) {
                println!("{}", node.id);
            }
        }
    }
}

pub fn print_profiles(state: &State, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let profiles: Vec<_> = state.profiles.values().collect();
            print_json(&profiles);
        }
        OutputFormat::Table => println!("{}", profiles_table(state)),
        OutputFormat::Pretty => {
            for profile in state.profiles.values() {
                println!("{}", profile_line(profile, state.is_active(&profile.id)));
            }
        }
        OutputFormat::Raw => {
            for id in state.profiles.keys() {
                println!("{id}");
            }
        }
    }
}

pub fn print_profile(profile: &Profile, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(profile),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "NAME", "ROUTES"])
                .add_row(vec![
                    profile.id.to_string(),
                    profile.name.clone(),
                    routes(profile),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", profile_line(profile, false)),
        OutputFormat::Raw => println!("{}", profile.id),
    }
}

#[derive(Serialize)]
struct ProfileStatus<'a> {
    id: &'a str,
    status: &'a str,
}

/// Result line for enable/disable/delete.
pub fn print_profile_status(id: &str, status: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ProfileStatus { id, status }),
        OutputFormat::Raw => println!("{id}"),
        OutputFormat::Table | OutputFormat::Pretty => println!("profile {id} {status}"),
    }
}

fn nodes_table(state: &State) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["NODE", "CONNECTED", "ADDRESS", "INPUTS", "OUTPUTS"]);
    for node in state.nodes.values() {
        table.add_row(vec![
            node.id.to_string(),
            node.connected.to_string(),
            address(node),
            node.inputs.keys().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            node.outputs
                .values()
                .map(|output| format!("{} ({} leds)", output.id, output.leds))
                .collect::<Vec<_>>()
                .join(", "),
        ]);
    }
    table
}

fn profiles_table(state: &State) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["PROFILE", "NAME", "ACTIVE", "ROUTES"]);
    for profile in state.profiles.values() {
        table.add_row(vec![
            profile.id.to_string(),
            profile.name.clone(),
            state.is_active(&profile.id).to_string(),
            routes(profile),
        ]);
    }
    table
}

fn node_line(node: &Node) -> String {
    format!(
        "node={} connected={} address={} inputs={} outputs={}",
        node.id,
        node.connected,
        address(node),
        node.inputs.len(),
        node.outputs.len()
    )
}

fn profile_line(profile: &Profile, active: bool) -> String {
    format!(
        "profile={} name={} active={} routes={}",
        profile.id,
        profile.name,
        active,
        routes(profile)
    )
}

fn address(node: &Node) -> String {
    node.address
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn routes(profile: &Profile) -> String {
    profile
        .io
        .iter()
        .map(|io| format!("{}={}", io.input_id, io.output_id))
        .collect::<Vec<_>>()
        .join(", ")
}
