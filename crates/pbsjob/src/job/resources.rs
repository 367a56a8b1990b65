use std::fmt::{Display, Formatter};

use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::sequence::{preceded, terminated, tuple};
use nom_supreme::ParserExt;
use serde::{Deserialize, Serialize};

use crate::common::error::spec_error;
use crate::common::parser::{NomResult, consume_all, p_u32};

/// Resource line of a job (`#PBS -l ...`).
///
/// PBS Pro requests resources in chunks (`select=1:ncpus=36:mpiprocs=2`),
/// Torque in nodes with a number of processors per node (`nodes=2:ppn=4`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceRequest {
    Select {
        chunks: u32,
        ncpus: u32,
        mpiprocs: Option<u32>,
    },
    Nodes {
        nodes: u32,
        ppn: u32,
    },
}

impl ResourceRequest {
    pub fn node_count(&self) -> u32 {
        match self {
            ResourceRequest::Select { chunks, .. } => *chunks,
            ResourceRequest::Nodes { nodes, .. } => *nodes,
        }
    }

    /// Number of MPI processes placed on a single node.
    pub fn processes_per_node(&self) -> u32 {
        match self {
            ResourceRequest::Select {
                ncpus, mpiprocs, ..
            } => mpiprocs.unwrap_or(*ncpus),
            ResourceRequest::Nodes { ppn, .. } => *ppn,
        }
    }

    pub fn cores_per_node(&self) -> u32 {
        match self {
            ResourceRequest::Select { ncpus, .. } => *ncpus,
            ResourceRequest::Nodes { ppn, .. } => *ppn,
        }
    }

    pub fn total_cores(&self) -> u64 {
        self.node_count() as u64 * self.cores_per_node() as u64
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.node_count() == 0 {
            return spec_error(format!("Resource request `{self}` asks for zero nodes"));
        }
        if self.cores_per_node() == 0 {
            return spec_error(format!("Resource request `{self}` asks for zero cores"));
        }
        if let ResourceRequest::Select {
            mpiprocs: Some(0), ..
        } = self
        {
            return spec_error(format!(
                "Resource request `{self}` asks for zero MPI processes"
            ));
        }
        Ok(())
    }
}

impl Display for ResourceRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRequest::Select {
                chunks,
                ncpus,
                mpiprocs,
            } => {
                write!(f, "select={chunks}:ncpus={ncpus}")?;
                if let Some(mpiprocs) = mpiprocs {
                    write!(f, ":mpiprocs={mpiprocs}")?;
                }
                Ok(())
            }
            ResourceRequest::Nodes { nodes, ppn } => write!(f, "nodes={nodes}:ppn={ppn}"),
        }
    }
}

impl TryFrom<String> for ResourceRequest {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_resource_request(&value)
    }
}

impl From<ResourceRequest> for String {
    fn from(request: ResourceRequest) -> Self {
        request.to_string()
    }
}

fn p_key_value<'a>(key: &'static str) -> impl FnMut(&'a str) -> NomResult<'a, u32> {
    preceded(terminated(tag(key), char('=')), p_u32)
}

fn p_select(input: &str) -> NomResult<ResourceRequest> {
    map(
        tuple((
            p_key_value("select"),
            preceded(char(':'), p_key_value("ncpus")),
            opt(preceded(char(':'), p_key_value("mpiprocs"))),
        )),
        |(chunks, ncpus, mpiprocs)| ResourceRequest::Select {
            chunks,
            ncpus,
            mpiprocs,
        },
    )
    .context("select=<chunks>:ncpus=<n>[:mpiprocs=<n>]")
    .parse(input)
}

fn p_nodes(input: &str) -> NomResult<ResourceRequest> {
    map(
        tuple((
            p_key_value("nodes"),
            preceded(char(':'), p_key_value("ppn")),
        )),
        |(nodes, ppn)| ResourceRequest::Nodes { nodes, ppn },
    )
    .context("nodes=<n>:ppn=<n>")
    .parse(input)
}

/// Parses the value of a `-l` resource directive,
/// e.g. `select=1:ncpus=36:mpiprocs=02` or `nodes=2:ppn=4`.
pub fn parse_resource_request(input: &str) -> anyhow::Result<ResourceRequest> {
    consume_all(alt((p_select, p_nodes)), input)
}
