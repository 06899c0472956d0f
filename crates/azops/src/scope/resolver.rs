//! Identifier and path resolution.
//!
//! Classification is a fixed, precedence-ordered list of anchored patterns:
//! resource identifiers are textual supersets of their containers, so the
//! most specific shape is always tested first.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::context::{ScopeContext, STATE_DIRECTORY};
use super::descriptor::{
    directory_segment, state_file_name, ManagementGroupRef, ResourceParent, Scope,
    ScopeDescriptor, SubscriptionRef, MANAGEMENT_GROUP_TOKEN, RESOURCE_GROUP_TOKEN,
    SUBSCRIPTION_TOKEN,
};
use super::error::ScopeError;
use crate::state::StateDocument;

static RE_MANAGEMENT_GROUP_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/providers/Microsoft\.Management/managementGroups/([^/]+)/providers/(.+)$")
        .unwrap()
});
static RE_RESOURCE_GROUP_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/(.+)$").unwrap()
});
static RE_SUBSCRIPTION_RESOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/subscriptions/([^/]+)/providers/(.+)$").unwrap());
static RE_RESOURCE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)$").unwrap());
static RE_SUBSCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/subscriptions/([^/]+)$").unwrap());
static RE_MANAGEMENT_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/providers/Microsoft\.Management/managementGroups/([^/]+)$").unwrap()
});

// Self-descriptor file names inside a `.AzState` directory
static RE_MANAGEMENT_GROUP_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Microsoft\.Management_managementGroups-.+?(\.parameters)?\.json$").unwrap()
});
static RE_SUBSCRIPTION_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Microsoft\.Subscription_subscriptions-.+?(\.parameters)?\.json$").unwrap()
});
static RE_RESOURCE_GROUP_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Microsoft\.Resources_resourceGroups-.+?(\.parameters)?\.json$").unwrap()
});

const ROOT_ID: &str = "/";

/// Resolves a resource identifier into a scope descriptor.
///
/// Names and display names come from the hierarchy cache; on a miss the raw
/// identifier segment stands in for both.
pub fn resolve_from_id(ctx: &ScopeContext, id: &str) -> Result<ScopeDescriptor, ScopeError> {
    let id = id.trim();
    let id = if id.len() > 1 {
        id.trim_end_matches('/')
    } else {
        id
    };

    if let Some(caps) = RE_MANAGEMENT_GROUP_RESOURCE.captures(id) {
        let management_group = management_group_ref(ctx, &caps[1]);
        let directory = management_group_directory(ctx, &management_group.id);
        return resource_descriptor(
            id,
            ResourceParent::ManagementGroup { management_group },
            directory,
            ctx.layout().export_raw_template,
        );
    }

    if let Some(caps) = RE_RESOURCE_GROUP_RESOURCE.captures(id) {
        let (subscription, management_group, subscription_dir) =
            subscription_location(ctx, &caps[1]);
        let resource_group = caps[2].to_string();
        let directory = subscription_dir.join(resource_group.to_lowercase());
        return resource_descriptor(
            id,
            ResourceParent::ResourceGroup {
                subscription,
                management_group,
                resource_group,
            },
            directory,
            ctx.layout().export_raw_template,
        );
    }

    if let Some(caps) = RE_SUBSCRIPTION_RESOURCE.captures(id) {
        let (subscription, management_group, directory) = subscription_location(ctx, &caps[1]);
        return resource_descriptor(
            id,
            ResourceParent::Subscription {
                subscription,
                management_group,
            },
            directory,
            ctx.layout().export_raw_template,
        );
    }

    let export_raw = ctx.layout().export_raw_template;

    if let Some(caps) = RE_RESOURCE_GROUP.captures(id) {
        let (subscription, management_group, subscription_dir) =
            subscription_location(ctx, &caps[1]);
        let resource_group = caps[2].to_string();
        let state_path = subscription_dir
            .join(resource_group.to_lowercase())
            .join(STATE_DIRECTORY)
            .join(state_file_name(RESOURCE_GROUP_TOKEN, &resource_group, export_raw));
        return Ok(ScopeDescriptor {
            id: id.to_string(),
            name: resource_group.clone(),
            state_path,
            scope: Scope::ResourceGroup {
                subscription,
                management_group,
                resource_group,
            },
        });
    }

    if let Some(caps) = RE_SUBSCRIPTION.captures(id) {
        let (subscription, management_group, directory) = subscription_location(ctx, &caps[1]);
        let state_path = directory
            .join(STATE_DIRECTORY)
            .join(state_file_name(SUBSCRIPTION_TOKEN, &subscription.id, export_raw));
        return Ok(ScopeDescriptor {
            id: id.to_string(),
            name: subscription.display_name.clone(),
            state_path,
            scope: Scope::Subscription {
                subscription,
                management_group,
            },
        });
    }

    if let Some(caps) = RE_MANAGEMENT_GROUP.captures(id) {
        let management_group = management_group_ref(ctx, &caps[1]);
        let state_path = management_group_directory(ctx, &management_group.id)
            .join(STATE_DIRECTORY)
            .join(state_file_name(
                MANAGEMENT_GROUP_TOKEN,
                &management_group.id,
                export_raw,
            ));
        return Ok(ScopeDescriptor {
            id: id.to_string(),
            name: management_group.display_name.clone(),
            state_path,
            scope: Scope::ManagementGroup { management_group },
        });
    }

    if id == ROOT_ID {
        return Ok(ScopeDescriptor {
            id: ROOT_ID.to_string(),
            name: ROOT_ID.to_string(),
            state_path: ctx.root().to_path_buf(),
            scope: Scope::Root,
        });
    }

    Err(ScopeError::Parse(id.to_string()))
}

/// Directory of a cached management group: the `"{DisplayName} ({Id})"`
/// segments of its ancestry, rooted at the state root.
///
/// Returns `None` when the group is not cached. A cycle in the parent links
/// is cut at the first repeated group.
pub fn management_group_path(ctx: &ScopeContext, management_group: &str) -> Option<PathBuf> {
    let hierarchy = ctx.hierarchy();
    let mut node = hierarchy.lookup_management_group(management_group)?;

    let mut segments = Vec::new();
    let mut seen = HashSet::new();
    loop {
        if !seen.insert(node.name.to_lowercase()) {
            log::warn!(
                "Cycle in management group ancestry at '{}', truncating path",
                node.name
            );
            break;
        }
        segments.push(directory_segment(&node.display_name, &node.name));

        match node
            .parent
            .as_deref()
            .and_then(|parent| hierarchy.lookup_management_group(parent))
        {
            Some(parent) => node = parent,
            None => break,
        }
    }

    let mut path = ctx.root().to_path_buf();
    for segment in segments.iter().rev() {
        path.push(segment);
    }
    Some(path)
}

/// Resolves a path inside the state tree into the scope that owns it.
///
/// The state root is the tenant root. A file whose document embeds a scope
/// identifier resolves to that identifier; anything else resolves through
/// the self-descriptor file in its owning directory's `.AzState`.
pub fn resolve_from_path(ctx: &ScopeContext, path: &Path) -> Result<ScopeDescriptor, ScopeError> {
    if is_state_root(ctx, path) {
        return resolve_from_id(ctx, ROOT_ID);
    }

    if path.is_file() {
        if let Some(id) = embedded_identifier(path)? {
            return resolve_from_id(ctx, &id);
        }
    }

    let directory = owning_directory(path);
    if is_state_root(ctx, &directory) {
        return resolve_from_id(ctx, ROOT_ID);
    }

    let state_dir = directory.join(STATE_DIRECTORY);
    let mut file_names: Vec<String> = match std::fs::read_dir(&state_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect(),
        Err(_) => return Err(ScopeError::AmbiguousPath(path.to_path_buf())),
    };
    file_names.sort();

    for pattern in [
        &*RE_MANAGEMENT_GROUP_FILE,
        &*RE_SUBSCRIPTION_FILE,
        &*RE_RESOURCE_GROUP_FILE,
    ] {
        if let Some(file_name) = file_names.iter().find(|name| pattern.is_match(name)) {
            let self_file = state_dir.join(file_name);
            return match embedded_identifier(&self_file)? {
                Some(id) => resolve_from_id(ctx, &id),
                None => Err(ScopeError::MissingIdentifier(self_file)),
            };
        }
    }

    Err(ScopeError::AmbiguousPath(path.to_path_buf()))
}

fn management_group_ref(ctx: &ScopeContext, name: &str) -> ManagementGroupRef {
    match ctx.hierarchy().lookup_management_group(name) {
        Some(node) => ManagementGroupRef {
            id: node.name.clone(),
            display_name: node.display_name.clone(),
        },
        None => ManagementGroupRef {
            id: name.to_string(),
            display_name: name.to_string(),
        },
    }
}

/// Uncached groups are placed directly under the state root.
fn management_group_directory(ctx: &ScopeContext, name: &str) -> PathBuf {
    management_group_path(ctx, name)
        .unwrap_or_else(|| ctx.root().join(directory_segment(name, name)))
}

/// Resolves a subscription's display name, parent group and directory.
fn subscription_location(
    ctx: &ScopeContext,
    subscription_id: &str,
) -> (SubscriptionRef, Option<ManagementGroupRef>, PathBuf) {
    let hierarchy = ctx.hierarchy();

    let (parent, entry) = match hierarchy.find_child_entry(subscription_id) {
        Some((node, entry)) => (Some(node), Some(entry)),
        None => (None, None),
    };

    let (id, display_name) = match (entry, hierarchy.lookup_subscription(subscription_id)) {
        (Some(entry), _) => (entry.name.clone(), entry.display_name.clone()),
        (None, Some(info)) => (info.subscription_id.clone(), info.display_name.clone()),
        (None, None) => (subscription_id.to_string(), subscription_id.to_string()),
    };

    let management_group = parent.map(|node| ManagementGroupRef {
        id: node.name.clone(),
        display_name: node.display_name.clone(),
    });

    let parent_dir = match &management_group {
        Some(group) => management_group_directory(ctx, &group.id),
        None => ctx.root().to_path_buf(),
    };
    let directory = parent_dir.join(directory_segment(&display_name, &id));

    (SubscriptionRef { id, display_name }, management_group, directory)
}

/// Builds a resource descriptor from the tail after the last `/providers/`:
/// `{provider}/{type}/{name}[/{type}/{name}...]`.
fn resource_descriptor(
    id: &str,
    parent: ResourceParent,
    parent_dir: PathBuf,
    export_raw: bool,
) -> Result<ScopeDescriptor, ScopeError> {
    let lowered = id.to_ascii_lowercase();
    let start = lowered
        .rfind("/providers/")
        .ok_or_else(|| ScopeError::Parse(id.to_string()))?;
    let tail = &id[start + "/providers/".len()..];

    let mut segments = tail.split('/');
    let provider = segments
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ScopeError::Parse(id.to_string()))?;
    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() || rest.len() % 2 != 0 || rest.iter().any(|s| s.is_empty()) {
        return Err(ScopeError::Parse(id.to_string()));
    }

    let types: Vec<&str> = rest.iter().step_by(2).copied().collect();
    let names: Vec<&str> = rest.iter().skip(1).step_by(2).copied().collect();
    let resource_type = types.join("_");
    let name = match names.as_slice() {
        [single] => single.to_string(),
        nested => nested
            .iter()
            .map(|segment| escape_name_segment(segment))
            .collect::<Vec<_>>()
            .join("_"),
    };

    let token = format!("{}_{}", provider, resource_type);
    let state_path = parent_dir
        .join(STATE_DIRECTORY)
        .join(state_file_name(&token, &name, export_raw));

    Ok(ScopeDescriptor {
        id: id.to_string(),
        name,
        state_path,
        scope: Scope::Resource {
            parent,
            provider: provider.to_string(),
            resource_type,
        },
    })
}

/// Escapes `%` and `_` inside one segment of a nested resource name, so
/// the `_`-joined name stays unique (`hub_app` + `web` is `hub%5Fapp_web`).
fn escape_name_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('_', "%5F")
}

fn is_state_root(ctx: &ScopeContext, path: &Path) -> bool {
    let root = ctx.root();
    if path == root {
        return true;
    }
    match (path.canonicalize(), root.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// The directory a path belongs to. Files inside `.AzState` belong to the
/// directory holding `.AzState`.
fn owning_directory(path: &Path) -> PathBuf {
    let directory = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    if directory.file_name().is_some_and(|name| name == STATE_DIRECTORY) {
        if let Some(parent) = directory.parent() {
            return parent.to_path_buf();
        }
    }
    directory
}

/// Reads the scope identifier embedded in a state file, if it carries one.
/// Files that are not JSON documents yield `None`.
fn embedded_identifier(path: &Path) -> Result<Option<String>, ScopeError> {
    let bytes = std::fs::read(path).map_err(|e| ScopeError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match StateDocument::from_slice(path, &bytes) {
        Ok(document) => Ok(document.identifier().map(str::to_string)),
        Err(e) => {
            log::debug!("{} is not a state document: {}", path.display(), e);
            Ok(None)
        }
    }
}
