//! Agent registry: the closed set of assistants the client can talk to.
//!
//! Adding an agent means adding an [`AgentId`] variant and its [`AgentInfo`]
//! entry below. There is no runtime registration because the backend
//! endpoints are not discoverable.

use std::str::FromStr;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::RegistryError;

/// Identifier of one backend-specialised assistant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum AgentId {
    /// Parametric modelling and geometry
    #[strum(to_string = "cad", serialize = "geometry")]
    Cad,
    /// Mesh generation for simulation
    #[strum(to_string = "mesh", serialize = "meshing")]
    Mesh,
    /// CFD / FEA case setup and analysis
    #[strum(to_string = "simulation", serialize = "sim", serialize = "cfd")]
    Simulation,
}

/// Display metadata and routing for an agent. Immutable for the life of the
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub id: AgentId,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Path joined onto the backend base URL.
    pub endpoint_path: &'static str,
    pub accent: Color,
    pub icon: &'static str,
    pub expertise: &'static [&'static str],
    pub placeholder: &'static str,
}

static CAD: AgentInfo = AgentInfo {
    id: AgentId::Cad,
    display_name: "CAD Agent",
    description: "3D modelling, parametric design and manufacturability checks",
    endpoint_path: "/agent/cad/chat",
    accent: Color::Cyan,
    icon: "📐",
    expertise: &[
        "Parametric modelling and design",
        "3D geometry creation and manipulation",
        "Design optimisation and validation",
        "Manufacturing constraints",
        "CAD file formats and conversion",
    ],
    placeholder: "Describe the part or geometry you need...",
};

static MESH: AgentInfo = AgentInfo {
    id: AgentId::Mesh,
    display_name: "Meshing Agent",
    description: "Simulation-ready meshes, mesh quality and boundary layers",
    endpoint_path: "/agent/mesh/chat",
    accent: Color::Green,
    icon: "🕸",
    expertise: &[
        "Mesh generation and optimisation",
        "Mesh quality assessment",
        "Boundary layer meshing",
        "blockMesh and snappyHexMesh dictionaries",
        "Mesh adaptation strategies",
    ],
    placeholder: "Describe the domain you want meshed...",
};

static SIMULATION: AgentInfo = AgentInfo {
    id: AgentId::Simulation,
    display_name: "Simulation Agent",
    description: "CFD and FEA case setup, physics models and results",
    endpoint_path: "/agent/simulation/chat",
    accent: Color::Magenta,
    icon: "🌀",
    expertise: &[
        "Computational fluid dynamics",
        "Finite element analysis",
        "Thermal and multi-physics analysis",
        "Boundary condition setup",
        "Results interpretation",
    ],
    placeholder: "Describe the case you want to simulate...",
};

impl AgentId {
    /// Registry entry for this agent. Total over the enum.
    pub fn info(self) -> &'static AgentInfo {
        match self {
            AgentId::Cad => &CAD,
            AgentId::Mesh => &MESH,
            AgentId::Simulation => &SIMULATION,
        }
    }
}

/// Resolve a textual agent id (as typed on the command line or in config).
pub fn resolve(id: &str) -> Result<&'static AgentInfo, RegistryError> {
    AgentId::from_str(id.trim())
        .map(AgentId::info)
        .map_err(|_| RegistryError::UnknownAgent(id.to_string()))
}

/// All agents in declaration order.
pub fn all() -> impl Iterator<Item = &'static AgentInfo> {
    AgentId::iter().map(AgentId::info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_every_canonical_id() {
        for id in AgentId::iter() {
            let info = resolve(id.as_ref()).unwrap();
            assert_eq!(info.id, id);
        }
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        assert_eq!(resolve("Geometry").unwrap().id, AgentId::Cad);
        assert_eq!(resolve("MESHING").unwrap().id, AgentId::Mesh);
        assert_eq!(resolve("cfd").unwrap().id, AgentId::Simulation);
        assert_eq!(resolve(" sim ").unwrap().id, AgentId::Simulation);
    }

    #[test]
    fn unknown_id_is_an_error_not_a_default() {
        assert_eq!(
            resolve("thermal"),
            Err(RegistryError::UnknownAgent("thermal".to_string()))
        );
        assert!(resolve("").is_err());
    }

    #[test]
    fn endpoints_are_distinct_and_rooted() {
        let paths: HashSet<_> = all().map(|a| a.endpoint_path).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.starts_with('/')));
    }

    #[test]
    fn display_uses_canonical_id() {
        assert_eq!(AgentId::Simulation.to_string(), "simulation");
        assert_eq!(AgentId::Mesh.as_ref(), "mesh");
    }
}
