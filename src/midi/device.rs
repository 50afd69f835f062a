// MIDI output port discovery

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

use super::{MidiError, MidiResult};

const CLIENT_NAME: &str = "acidstep";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// How the user picked an output port on the command line or in config
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortSelector {
    Index(usize),
    Name(String),
}

impl PortSelector {
    /// Numeric input selects by index, anything else by name
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<usize>() {
            Ok(index) => PortSelector::Index(index),
            Err(_) => PortSelector::Name(value.to_string()),
        }
    }
}

/// List every MIDI output port currently visible
pub fn list_output_ports() -> MidiResult<Vec<MidiPortInfo>> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let ports = midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();
    Ok(ports)
}

fn find_port(midi_out: &MidiOutput, selector: &PortSelector) -> Option<(MidiOutputPort, String)> {
    let ports = midi_out.ports();
    match selector {
        PortSelector::Index(index) => {
            let port = ports.get(*index)?.clone();
            let name = midi_out.port_name(&port).ok()?;
            Some((port, name))
        }
        // Exact match first, then the first port whose name contains the query
        PortSelector::Name(query) => {
            let named: Vec<(MidiOutputPort, String)> = ports
                .into_iter()
                .filter_map(|p| midi_out.port_name(&p).ok().map(|n| (p, n)))
                .collect();
            let exact = named.iter().position(|(_, n)| n == query);
            let partial = || named.iter().position(|(_, n)| n.contains(query.as_str()));
            let index = exact.or_else(partial)?;
            named.into_iter().nth(index)
        }
    }
}

/// Open a connection to the selected output port
///
/// Returns the connection together with the resolved port name.
pub fn open_output(selector: &PortSelector) -> MidiResult<(MidiOutputConnection, String)> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let (port, name) = find_port(&midi_out, selector).ok_or_else(|| {
        MidiError::PortNotFound(match selector {
            PortSelector::Index(index) => format!("#{}", index),
            PortSelector::Name(name) => name.clone(),
        })
    })?;

    let connection = midi_out
        .connect(&port, "acidstep-out")
        .map_err(|e| MidiError::Connect {
            port: name.clone(),
            reason: e.to_string(),
        })?;

    log::info!("MIDI output connected: {}", name);
    Ok((connection, name))
}
