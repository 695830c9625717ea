//! Contract artifact resolution.
//!
//! Artifacts are produced by the external build (Hardhat or Foundry) and looked up
//! here by contract name. Each resolved artifact is exposed through the
//! [`ContractFactory`] capability, which turns constructor arguments into creation code.

mod link;

pub use link::{LinkOffset, LinkReferences, LinkedBytecode, link_bytecode};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_core::{
    dyn_abi::{JsonAbiExt, Specifier},
    json_abi::JsonAbi,
    primitives::{Address, Bytes},
};
use serde::Deserialize;

use crate::error::{DeployError, SubmissionFailure};

/// Directory name Hardhat uses for compiler inputs and outputs, which are not artifacts.
const BUILD_INFO_DIR: &str = "build-info";

/// Compiled interface and creation bytecode of one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    /// Fully qualified name, `path/To.sol:Name`.
    pub qualified_name: String,
    pub abi: JsonAbi,
    /// Linked creation bytecode.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Callable function signatures, in ABI order.
    pub fn signatures(&self) -> Vec<String> {
        self.abi.functions().map(|f| f.signature()).collect()
    }

    /// Number of constructor parameters.
    pub fn constructor_arity(&self) -> usize {
        self.abi.constructor().map_or(0, |c| c.inputs.len())
    }

    /// ABI-encode `args` against the constructor and append them to the bytecode.
    ///
    /// Arguments are given in their textual form and coerced to the parameter types.
    pub fn encode_creation_code(&self, args: &[String]) -> Result<Bytes, SubmissionFailure> {
        let arity = self.constructor_arity();
        if args.len() != arity {
            return Err(SubmissionFailure::InvalidArguments(format!(
                "constructor of {} takes {} argument(s), {} given",
                self.name,
                arity,
                args.len()
            )));
        }

        let mut code = self.bytecode.to_vec();
        let Some(constructor) = self.abi.constructor() else {
            return Ok(code.into());
        };

        let values = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(param, raw)| {
                let ty = param.resolve().map_err(|e| {
                    SubmissionFailure::InvalidArguments(format!(
                        "unsupported constructor parameter type `{}`: {}",
                        param.ty, e
                    ))
                })?;
                ty.coerce_str(raw).map_err(|e| {
                    SubmissionFailure::InvalidArguments(format!(
                        "cannot use `{}` as `{} {}`: {}",
                        raw, param.ty, param.name, e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let encoded = constructor.abi_encode_input(&values).map_err(|e| {
            SubmissionFailure::InvalidArguments(format!("failed to encode constructor arguments: {}", e))
        })?;
        code.extend_from_slice(&encoded);

        Ok(code.into())
    }
}

/// Something that can produce deployable creation code for a named contract.
pub trait ContractFactory: Send + Sync {
    fn artifact(&self) -> &ContractArtifact;

    fn name(&self) -> &str {
        &self.artifact().name
    }

    /// Creation code for the given constructor arguments.
    fn creation_code(&self, args: &[String]) -> Result<Bytes, SubmissionFailure> {
        self.artifact().encode_creation_code(args)
    }
}

/// Factory backed by an artifact from the build output.
#[derive(Debug, Clone)]
pub struct CompiledContract {
    artifact: ContractArtifact,
}

impl CompiledContract {
    pub fn new(artifact: ContractArtifact) -> Self {
        Self { artifact }
    }
}

impl ContractFactory for CompiledContract {
    fn artifact(&self) -> &ContractArtifact {
        &self.artifact
    }
}

/// On-disk artifact, covering both the Hardhat and the Foundry layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: Option<String>,
    source_name: Option<String>,
    abi: JsonAbi,
    bytecode: BytecodeField,
    #[serde(default)]
    link_references: LinkReferences,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    /// Hardhat: a hex string, link references live at the top level.
    Hex(String),
    /// Foundry: an object with its own link references.
    Object {
        object: String,
        #[serde(default, rename = "linkReferences")]
        link_references: LinkReferences,
    },
}

#[derive(Clone)]
enum ArtifactEntry {
    Ready(Arc<dyn ContractFactory>),
    Invalid { qualified_name: String, reason: String },
}

impl ArtifactEntry {
    fn qualified_name(&self) -> &str {
        match self {
            ArtifactEntry::Ready(factory) => &factory.artifact().qualified_name,
            ArtifactEntry::Invalid { qualified_name, .. } => qualified_name,
        }
    }
}

/// Read-only lookup of contract factories by name.
///
/// Names resolve either as a bare contract name or as a fully qualified
/// `path/To.sol:Name`. A bare name shared by several sources must be qualified.
#[derive(Clone, Default)]
pub struct ArtifactRegistry {
    root: PathBuf,
    by_name: BTreeMap<String, Vec<ArtifactEntry>>,
    by_qualified_name: BTreeMap<String, ArtifactEntry>,
}

impl ArtifactRegistry {
    /// Create an empty registry whose lookups report `root` as the searched location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load every artifact below `root`, linking libraries from `libraries`.
    ///
    /// A missing `root` yields an empty registry, so lookups report
    /// `ArtifactNotFound` rather than an I/O error.
    pub fn load(
        root: impl Into<PathBuf>,
        libraries: &BTreeMap<String, Address>,
    ) -> anyhow::Result<Self> {
        let mut registry = Self::new(root);

        if !registry.root.exists() {
            tracing::warn!(
                path = %registry.root.display(),
                "Artifacts directory does not exist, was the project compiled?"
            );
            return Ok(registry);
        }

        let mut files = Vec::new();
        collect_artifact_files(&registry.root, &mut files)?;
        files.sort();

        for path in files {
            registry.insert_entry(load_entry(&registry.root, &path, libraries));
        }

        tracing::debug!(
            path = %registry.root.display(),
            contracts = registry.by_qualified_name.len(),
            "Artifacts loaded"
        );
        Ok(registry)
    }

    /// Register a factory directly.
    pub fn register(&mut self, factory: Arc<dyn ContractFactory>) {
        self.insert_entry(ArtifactEntry::Ready(factory));
    }

    fn insert_entry(&mut self, entry: ArtifactEntry) {
        let qualified = entry.qualified_name().to_string();
        let name = qualified
            .rsplit_once(':')
            .map_or(qualified.as_str(), |(_, name)| name)
            .to_string();

        let same_name = self.by_name.entry(name).or_default();
        same_name.retain(|existing| existing.qualified_name() != qualified);
        same_name.push(entry.clone());
        self.by_qualified_name.insert(qualified, entry);
    }

    /// Look up the factory for `contract_name`.
    pub fn resolve_artifact(&self, contract_name: &str) -> Result<&dyn ContractFactory, DeployError> {
        let entry = if contract_name.contains(':') {
            self.by_qualified_name.get(contract_name)
        } else {
            match self.by_name.get(contract_name).map(Vec::as_slice) {
                Some([entry]) => Some(entry),
                Some(candidates) if candidates.len() > 1 => {
                    let names: Vec<_> = candidates.iter().map(ArtifactEntry::qualified_name).collect();
                    return Err(DeployError::InvalidArtifact {
                        name: contract_name.to_string(),
                        reason: format!("ambiguous name, use one of: {}", names.join(", ")),
                    });
                }
                _ => None,
            }
        };

        match entry {
            Some(ArtifactEntry::Ready(factory)) => Ok(factory.as_ref()),
            Some(ArtifactEntry::Invalid { reason, .. }) => Err(DeployError::InvalidArtifact {
                name: contract_name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(DeployError::ArtifactNotFound {
                name: contract_name.to_string(),
                searched: self.root.display().to_string(),
            }),
        }
    }

    /// Fully qualified names of all known artifacts, deployable or not.
    pub fn qualified_names(&self) -> Vec<&str> {
        self.by_qualified_name.keys().map(String::as_str).collect()
    }

    /// Deployable factories, ordered by qualified name.
    pub fn factories(&self) -> impl Iterator<Item = &dyn ContractFactory> {
        self.by_qualified_name.values().filter_map(|entry| match entry {
            ArtifactEntry::Ready(factory) => Some(factory.as_ref()),
            ArtifactEntry::Invalid { .. } => None,
        })
    }
}

/// Collect `<Name>.json` files that sit inside `<Source>.sol` directories.
fn collect_artifact_files(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    use anyhow::Context;

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to get file type of {}", path.display()))?;

        if file_type.is_dir() {
            if entry.file_name() != BUILD_INFO_DIR {
                collect_artifact_files(&path, files)?;
            }
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let in_source_dir = dir
            .extension()
            .is_some_and(|ext| ext == "sol");

        if in_source_dir && file_name.ends_with(".json") && !file_name.ends_with(".dbg.json") {
            files.push(path);
        }
    }

    Ok(())
}

fn load_entry(root: &Path, path: &Path, libraries: &BTreeMap<String, Address>) -> ArtifactEntry {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let source_dir = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let fallback_name = format!("{}:{}", source_dir, stem);

    let file = match read_artifact_file(path) {
        Ok(file) => file,
        Err(reason) => {
            tracing::debug!(path = %path.display(), reason = %reason, "Artifact could not be parsed");
            return ArtifactEntry::Invalid {
                qualified_name: fallback_name,
                reason,
            };
        }
    };

    let name = file.contract_name.clone().unwrap_or(stem);
    let qualified_name = format!(
        "{}:{}",
        file.source_name.clone().unwrap_or(source_dir),
        name
    );

    match build_artifact(name, qualified_name.clone(), file, libraries) {
        Ok(artifact) => ArtifactEntry::Ready(Arc::new(CompiledContract::new(artifact))),
        Err(reason) => ArtifactEntry::Invalid {
            qualified_name,
            reason,
        },
    }
}

fn read_artifact_file(path: &Path) -> Result<ArtifactFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("invalid artifact {}: {}", path.display(), e))
}

fn build_artifact(
    name: String,
    qualified_name: String,
    file: ArtifactFile,
    libraries: &BTreeMap<String, Address>,
) -> Result<ContractArtifact, String> {
    let (code, references) = match file.bytecode {
        BytecodeField::Hex(code) => (code, file.link_references),
        BytecodeField::Object {
            object,
            link_references,
        } => (object, link_references),
    };

    let linked = link_bytecode(&code, &references, libraries)?;
    if !linked.unlinked.is_empty() {
        return Err(format!(
            "unlinked libraries {}; set their addresses under [libraries]",
            linked.unlinked.join(", ")
        ));
    }
    if linked.bytecode.is_empty() {
        return Err("no creation bytecode (interface or abstract contract)".to_string());
    }

    Ok(ContractArtifact {
        name,
        qualified_name,
        abi: file.abi,
        bytecode: linked.bytecode,
    })
}
