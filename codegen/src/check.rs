//! Well-formedness check for rendered artifacts.
//!
//! Every `.rs` artifact is parsed with `syn`, the manifest with `toml`, and
//! the module tree is walked from each crate root to confirm that `mod`
//! declarations resolve to artifacts, that `use` paths start from something
//! the crate can see, and that no source file is left outside the tree.
//! Findings are [`IssueKind::OutputWellFormedness`] issues: they signal a
//! generator defect, never a problem with the input.
//!
//! [`IssueKind::OutputWellFormedness`]: cliforge_core::IssueKind::OutputWellFormedness

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use cliforge_core::{ArtifactSet, Issue, IssueCode};
use syn::ext::IdentExt;
use syn::{Ident, Item, UseTree};
use tracing::debug;

const MANIFEST: &str = "Cargo.toml";

/// Crates every target can name without a dependency.
const SYSTEM_CRATES: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Relative path keywords.
const PATH_KEYWORDS: &[&str] = &["self", "super", "Self"];

/// Checks `artifacts` and returns the issues in artifact order.
///
/// # Examples
///
/// ```
/// use cliforge_codegen::check;
/// use cliforge_core::{ArtifactSet, IssueCode};
///
/// let mut artifacts = ArtifactSet::new();
/// artifacts.insert("Cargo.toml", "[package]\nname = \"demo\"\n");
/// artifacts.insert("src/main.rs", "mod util;\nfn main() {}\n");
///
/// let issues = check(&artifacts);
/// assert_eq!(issues.len(), 1);
/// assert_eq!(issues[0].code, IssueCode::UnresolvedModule);
/// ```
pub fn check(artifacts: &ArtifactSet) -> Vec<Issue> {
    let order: HashMap<&str, usize> = artifacts.paths().enumerate().map(|(i, p)| (p, i)).collect();
    let mut findings: Vec<(usize, Issue)> = Vec::new();
    let mut report = |path: &str, code: IssueCode, message: String| {
        let position = order.get(path).copied().unwrap_or(0);
        findings.push((position, Issue::new(code, path, message)));
    };

    let manifest = match artifacts.get(MANIFEST) {
        Some(text) => match Manifest::parse(text) {
            Ok(manifest) => Some(manifest),
            Err(message) => {
                report(MANIFEST, IssueCode::ManifestError, message);
                None
            }
        },
        None => {
            report(MANIFEST, IssueCode::ManifestError, "manifest is missing".into());
            None
        }
    };

    let mut parsed: HashMap<&str, syn::File> = HashMap::new();
    for (path, source) in artifacts {
        if !path.ends_with(".rs") {
            continue;
        }
        match syn::parse_file(source) {
            Ok(file) => {
                parsed.insert(path.as_str(), file);
            }
            Err(err) => report(
                path.as_str(),
                IssueCode::SyntaxError,
                format!("does not parse: {err}"),
            ),
        }
    }

    let roots: Vec<&str> = artifacts.paths().filter(|p| is_crate_root(p)).collect();
    if manifest.is_some() && !roots.iter().any(|r| matches!(*r, "src/main.rs" | "src/lib.rs")) {
        report(
            MANIFEST,
            IssueCode::ManifestError,
            "no crate root (expected `src/main.rs` or `src/lib.rs`)".into(),
        );
    }

    // Module tree, breadth first from every crate root.
    let mut crate_of: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for &root in &roots {
        crate_of.insert(root, root);
        queue.push_back(root);
    }
    while let Some(path) = queue.pop_front() {
        let Some(file) = parsed.get(path) else {
            continue;
        };
        let owner = crate_of[path];
        let mut declared = Vec::new();
        collect_mod_decls(&file.items, &module_dir(path), &mut declared);
        for (name, candidates) in declared {
            match candidates
                .iter()
                .find_map(|c| artifacts.get_key_value(c).map(|(key, _)| key))
            {
                Some(found) => {
                    if !crate_of.contains_key(found) {
                        crate_of.insert(found, owner);
                        queue.push_back(found);
                    }
                }
                None => report(
                    path,
                    IssueCode::UnresolvedModule,
                    format!(
                        "module `{name}` has no file (expected `{}` or `{}`)",
                        candidates[0], candidates[1]
                    ),
                ),
            }
        }
    }

    for path in artifacts.paths() {
        if path.starts_with("src/") && path.ends_with(".rs") && !crate_of.contains_key(path) {
            report(
                path,
                IssueCode::OrphanModule,
                "not reachable from any crate root".into(),
            );
        }
    }

    // Imports, for every file that belongs to a crate.
    let has_lib = artifacts.contains("src/lib.rs");
    let root_scopes: HashMap<&str, Scope> = roots
        .iter()
        .filter_map(|r| parsed.get(r).map(|f| (*r, Scope::of(&f.items))))
        .collect();
    for path in artifacts.paths() {
        let (Some(file), Some(root)) = (parsed.get(path), crate_of.get(path)) else {
            continue;
        };
        let resolver = Resolver {
            manifest: manifest.as_ref(),
            crate_scope: root_scopes.get(root),
            outside_src: !root.starts_with("src/"),
            has_lib,
        };
        let mut unresolved = Vec::new();
        resolver.check_items(&file.items, &mut unresolved);
        for import in unresolved {
            report(
                path,
                IssueCode::UnresolvedImport,
                format!("unresolved import `{import}`"),
            );
        }
    }

    findings.sort_by_key(|(position, _)| *position);
    let issues: Vec<Issue> = findings.into_iter().map(|(_, issue)| issue).collect();
    debug!(
        artifacts = artifacts.len(),
        issues = issues.len(),
        "checked artifacts"
    );
    issues
}

#[derive(Debug)]
struct Manifest {
    package: String,
    dependencies: BTreeSet<String>,
    dev_dependencies: BTreeSet<String>,
}

impl Manifest {
    fn parse(text: &str) -> Result<Self, String> {
        let table: toml::Table = toml::from_str(text).map_err(|err| format!("invalid TOML: {err}"))?;
        let package = table
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(toml::Value::as_str)
            .ok_or_else(|| "missing `[package].name`".to_string())?;
        Ok(Self {
            package: package.replace('-', "_"),
            dependencies: crate_keys(&table, "dependencies"),
            dev_dependencies: crate_keys(&table, "dev-dependencies"),
        })
    }
}

/// Crate names (as written in code) of one dependency table.
fn crate_keys(table: &toml::Table, section: &str) -> BTreeSet<String> {
    table
        .get(section)
        .and_then(toml::Value::as_table)
        .map(|deps| deps.keys().map(|k| k.replace('-', "_")).collect())
        .unwrap_or_default()
}

fn is_direct_child(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".rs"))
}

fn is_crate_root(path: &str) -> bool {
    matches!(path, "src/main.rs" | "src/lib.rs" | "build.rs")
        || is_direct_child(path, "src/bin")
        || is_direct_child(path, "tests")
        || is_direct_child(path, "benches")
}

/// Directory holding the files of modules declared in `path`.
fn module_dir(path: &str) -> String {
    let (parent, file) = path.rsplit_once('/').unwrap_or(("", path));
    if is_crate_root(path) || file == "mod.rs" {
        return parent.to_string();
    }
    join(parent, file.trim_end_matches(".rs"))
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Out-of-line `mod` declarations with their candidate file paths.
fn collect_mod_decls(items: &[Item], dir: &str, out: &mut Vec<(String, [String; 2])>) {
    for item in items {
        let Item::Mod(module) = item else {
            continue;
        };
        if module.attrs.iter().any(|a| a.path().is_ident("path")) {
            continue;
        }
        let name = module.ident.unraw().to_string();
        match &module.content {
            Some((_, inner)) => collect_mod_decls(inner, &join(dir, &name), out),
            None => out.push((
                name.clone(),
                [
                    join(dir, &format!("{name}.rs")),
                    join(dir, &format!("{name}/mod.rs")),
                ],
            )),
        }
    }
}

/// Names bound at one module level.
#[derive(Debug, Default)]
struct Scope {
    names: HashSet<String>,
    /// A glob import makes the name set open-ended.
    glob: bool,
}

impl Scope {
    fn of(items: &[Item]) -> Self {
        let mut scope = Self::default();
        for item in items {
            if let Item::Use(import) = item {
                scope.bind_use(&import.tree, None);
            } else if let Some(ident) = item_ident(item) {
                scope.names.insert(ident.unraw().to_string());
            }
        }
        scope
    }

    fn bind_use(&mut self, tree: &UseTree, parent: Option<&Ident>) {
        match tree {
            UseTree::Path(path) => self.bind_use(&path.tree, Some(&path.ident)),
            UseTree::Name(name) if name.ident == "self" => {
                if let Some(parent) = parent {
                    self.names.insert(parent.unraw().to_string());
                }
            }
            UseTree::Name(name) => {
                self.names.insert(name.ident.unraw().to_string());
            }
            UseTree::Rename(rename) => {
                self.names.insert(rename.rename.unraw().to_string());
            }
            UseTree::Glob(_) => self.glob = true,
            UseTree::Group(group) => {
                for tree in &group.items {
                    self.bind_use(tree, parent);
                }
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

fn item_ident(item: &Item) -> Option<&Ident> {
    match item {
        Item::Const(i) => Some(&i.ident),
        Item::Enum(i) => Some(&i.ident),
        Item::ExternCrate(i) => Some(i.rename.as_ref().map_or(&i.ident, |(_, r)| r)),
        Item::Fn(i) => Some(&i.sig.ident),
        Item::Macro(i) => i.ident.as_ref(),
        Item::Mod(i) => Some(&i.ident),
        Item::Static(i) => Some(&i.ident),
        Item::Struct(i) => Some(&i.ident),
        Item::Trait(i) => Some(&i.ident),
        Item::TraitAlias(i) => Some(&i.ident),
        Item::Type(i) => Some(&i.ident),
        Item::Union(i) => Some(&i.ident),
        _ => None,
    }
}

/// First segment of a `use` tree and the segments that follow it.
fn use_roots(tree: &UseTree, out: &mut Vec<(String, Vec<String>)>) {
    match tree {
        UseTree::Path(path) => {
            let mut next = Vec::new();
            second_segments(&path.tree, &mut next);
            out.push((path.ident.unraw().to_string(), next));
        }
        UseTree::Name(name) => out.push((name.ident.unraw().to_string(), Vec::new())),
        UseTree::Rename(rename) => out.push((rename.ident.unraw().to_string(), Vec::new())),
        UseTree::Glob(_) => {}
        UseTree::Group(group) => {
            for tree in &group.items {
                use_roots(tree, out);
            }
        }
    }
}

fn second_segments(tree: &UseTree, out: &mut Vec<String>) {
    match tree {
        UseTree::Path(path) => out.push(path.ident.unraw().to_string()),
        UseTree::Name(name) if name.ident != "self" => out.push(name.ident.unraw().to_string()),
        UseTree::Name(_) | UseTree::Glob(_) => {}
        UseTree::Rename(rename) => out.push(rename.ident.unraw().to_string()),
        UseTree::Group(group) => {
            for tree in &group.items {
                second_segments(tree, out);
            }
        }
    }
}

struct Resolver<'a> {
    /// `None` when the manifest is unusable; external roots are then not
    /// checked.
    manifest: Option<&'a Manifest>,
    crate_scope: Option<&'a Scope>,
    /// Integration tests, benches and build scripts see dev-dependencies.
    outside_src: bool,
    has_lib: bool,
}

impl Resolver<'_> {
    fn check_items(&self, items: &[Item], unresolved: &mut Vec<String>) {
        let scope = Scope::of(items);
        for item in items {
            match item {
                Item::Use(import) => {
                    let mut roots = Vec::new();
                    use_roots(&import.tree, &mut roots);
                    for (root, next) in roots {
                        let absolute = import.leading_colon.is_some();
                        unresolved.extend(self.resolve(&root, &next, absolute, &scope));
                    }
                }
                Item::Mod(module) => {
                    if let Some((_, inner)) = &module.content {
                        self.check_items(inner, unresolved);
                    }
                }
                _ => {}
            }
        }
    }

    /// Paths under `root` that cannot be resolved.
    fn resolve(&self, root: &str, next: &[String], absolute: bool, scope: &Scope) -> Vec<String> {
        if root == "crate" && !absolute {
            return match self.crate_scope {
                Some(crate_scope) if !crate_scope.glob => next
                    .iter()
                    .filter(|n| !crate_scope.contains(n))
                    .map(|n| format!("crate::{n}"))
                    .collect(),
                _ => Vec::new(),
            };
        }
        if !absolute && (PATH_KEYWORDS.contains(&root) || scope.contains(root) || scope.glob) {
            return Vec::new();
        }
        if SYSTEM_CRATES.contains(&root) || self.is_extern(root) {
            return Vec::new();
        }
        vec![root.to_string()]
    }

    fn is_extern(&self, name: &str) -> bool {
        let Some(manifest) = self.manifest else {
            return true;
        };
        manifest.dependencies.contains(name)
            || (self.outside_src
                && (manifest.dev_dependencies.contains(name)
                    || (self.has_lib && manifest.package == name)))
    }
}
