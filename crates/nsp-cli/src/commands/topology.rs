use anyhow::{Context, Result};
use nsp_core::messages::InputMessage;
use nsp_core::{Network, Topology};
use nsp_io::read_messages;
use std::path::Path;

pub fn handle(messages: &Path) -> Result<()> {
    let mut buses = None;
    let mut branches = None;
    for message in read_messages(messages)? {
        match message {
            InputMessage::Bus(msg) if buses.is_none() => buses = Some(msg.to_buses()?),
            InputMessage::Component(msg) if branches.is_none() => {
                branches = Some(msg.to_branches()?)
            }
            _ => {}
        }
    }

    let buses = buses.with_context(|| format!("{} has no bus info", messages.display()))?;
    let branches =
        branches.with_context(|| format!("{} has no component info", messages.display()))?;

    let network = Network::from_parts(buses, branches)?;
    let topology = Topology::build(&network)?;
    let root = network
        .bus(topology.root())
        .map(|bus| bus.name.as_str())
        .unwrap_or_default();

    println!("{}", network.stats());
    println!("root: {}", root);
    println!("max depth: {}", topology.max_depth());
    Ok(())
}
