use std::sync::Arc;
use tracing::{debug, info};

use super::{RouteTable, VerbAction};
use crate::controller::{Controller, ControllerDescriptor, HandlerMarker, ReturnKind};
use crate::error::BuildError;
use crate::module::Module;

/// The set of controller declarations known to the application.
///
/// Filled from `#[module]` declarations or by registering controllers one
/// by one; the scanner then picks the ones under its namespace.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    controllers: Vec<ControllerDescriptor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: Controller>(&mut self) -> &mut Self {
        self.add_descriptor(C::descriptor())
    }

    /// Registering the same controller twice keeps the first registration.
    pub fn add_descriptor(&mut self, descriptor: ControllerDescriptor) -> &mut Self {
        if self.controllers.iter().any(|c| c.name == descriptor.name) {
            debug!("Controller {} already registered", descriptor.name);
        } else {
            self.controllers.push(descriptor);
        }
        self
    }

    pub fn import<M: Module>(&mut self) -> &mut Self {
        M::register(self);
        self
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerDescriptor> {
        self.controllers.iter()
    }
}

/// Builds the route table from a [`Catalog`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    marker: HandlerMarker,
}

impl Scanner {
    pub fn new(marker: HandlerMarker) -> Self {
        Self { marker }
    }

    /// Maps every marked controller under `namespace`. Fails when none is
    /// found, when a handler cannot be rendered, or on conflicting routes.
    pub fn scan(&self, catalog: &Catalog, namespace: &str) -> Result<RouteTable, BuildError> {
        let namespace = namespace.trim().replace('.', "::");
        let candidates: Vec<&ControllerDescriptor> = catalog
            .iter()
            .filter(|c| c.marker == self.marker && in_namespace(c.module_path, &namespace))
            .collect();

        if candidates.is_empty() {
            return Err(BuildError::NoControllers { namespace });
        }

        let mut table = RouteTable::new();
        for descriptor in candidates {
            self.map(descriptor, &mut table)?;
            table.register_controller(Arc::new(descriptor.clone()));
        }

        info!(
            "Mapped {} URL(s) under namespace {}",
            table.len(),
            namespace
        );
        Ok(table)
    }

    fn map(&self, controller: &ControllerDescriptor, table: &mut RouteTable) -> Result<(), BuildError> {
        for method in &controller.methods {
            let Some(url) = method.url else {
                continue;
            };

            let renderable = match method.returns {
                ReturnKind::View | ReturnKind::Text | ReturnKind::File => true,
                ReturnKind::Json | ReturnKind::Other(_) => method.rest,
            };
            if !renderable {
                return Err(BuildError::InvalidReturnType {
                    controller: controller.name.to_string(),
                    method: method.name.to_string(),
                    returned: method.returns.to_string(),
                });
            }

            let url = join_url(controller.path_prefix, url);
            for verb in method.effective_verbs() {
                let action = VerbAction::new(verb, method.name)?;
                debug!("Mapped {} {} => {}::{}", action.verb(), url, controller.name, method.name);
                table.insert(&url, controller.name, action)?;
            }
        }
        Ok(())
    }
}

/// Free-function form of [`Scanner::scan`].
pub fn scan(
    catalog: &Catalog,
    namespace: &str,
    marker: HandlerMarker,
) -> Result<RouteTable, BuildError> {
    Scanner::new(marker).scan(catalog, namespace)
}

fn in_namespace(module_path: &str, namespace: &str) -> bool {
    module_path == namespace
        || module_path
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with("::"))
}

fn join_url(prefix: Option<&str>, url: &str) -> String {
    let url = url.trim();
    let path = match prefix.map(|p| p.trim().trim_end_matches('/')) {
        Some(prefix) if !prefix.is_empty() => {
            format!("{}/{}", prefix, url.trim_start_matches('/'))
        }
        _ => url.to_string(),
    };

    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Arguments, Instance, MethodDescriptor};
    use crate::error::DispatchError;
    use crate::response::HandlerResult;
    use crate::session::Session;
    use std::any::Any;

    fn factory(_: &Session) -> Result<Instance, DispatchError> {
        Ok(Arc::new(()))
    }

    fn invoke(_: &(dyn Any + Send + Sync), _: Arguments) -> Result<HandlerResult, DispatchError> {
        Ok(HandlerResult::Text(String::new()))
    }

    fn users() -> ControllerDescriptor {
        ControllerDescriptor::new("Users", "app::controllers::users", factory)
            .method(MethodDescriptor::new("show_form", ReturnKind::View, invoke).url("/signup"))
            .method(
                MethodDescriptor::new("submit", ReturnKind::View, invoke)
                    .url("/signup")
                    .verb("POST"),
            )
            .method(MethodDescriptor::new("helper", ReturnKind::Other("()"), invoke))
    }

    #[test]
    fn test_scan_merges_verbs_per_url() {
        let mut catalog = Catalog::new();
        catalog.add_descriptor(users());

        let table = Scanner::default().scan(&catalog, "app::controllers").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("/signup").unwrap().verbs(), vec!["GET", "POST"]);
        assert!(table.controller("Users").is_some());
    }

    #[test]
    fn test_dotted_namespace_and_filtering() {
        let mut catalog = Catalog::new();
        catalog.add_descriptor(users());
        catalog.add_descriptor(ControllerDescriptor::new("Other", "app::controllersx", factory));

        assert!(Scanner::default().scan(&catalog, "app.controllers").is_ok());
        assert!(matches!(
            Scanner::default().scan(&catalog, "app::admin"),
            Err(BuildError::NoControllers { ref namespace }) if namespace == "app::admin"
        ));
        assert!(matches!(
            scan(&catalog, "app", HandlerMarker("rest-controller")),
            Err(BuildError::NoControllers { .. })
        ));
    }

    #[test]
    fn test_unrenderable_return_type_fails() {
        let mut catalog = Catalog::new();
        catalog.add_descriptor(
            ControllerDescriptor::new("Broken", "app::broken", factory)
                .method(MethodDescriptor::new("count", ReturnKind::Other("u32"), invoke).url("/count")),
        );
        let err = Scanner::default().scan(&catalog, "app").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The method count in Broken has returned an invalid type. Returned type: u32"
        );

        let mut catalog = Catalog::new();
        catalog.add_descriptor(
            ControllerDescriptor::new("Api", "app::api", factory).method(
                MethodDescriptor::new("count", ReturnKind::Json, invoke)
                    .url("/count")
                    .rest(),
            ),
        );
        assert!(Scanner::default().scan(&catalog, "app").is_ok());
    }

    #[test]
    fn test_path_prefix_is_applied() {
        let mut descriptor = users();
        descriptor.path_prefix = Some("/account/");
        let mut catalog = Catalog::new();
        catalog.add_descriptor(descriptor);

        let table = Scanner::default().scan(&catalog, "app").unwrap();
        assert_eq!(table.urls(), vec!["/account/signup"]);
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url(None, "signup"), "/signup");
        assert_eq!(join_url(Some("/users"), "/"), "/users");
        assert_eq!(join_url(Some(""), "/"), "/");
        assert_eq!(join_url(Some("users"), "list"), "/users/list");
    }
}
