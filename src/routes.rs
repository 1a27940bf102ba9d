use std::collections::HashMap;

/// A canned response registered for one (route, method) pair, together with
/// the parameters a request must carry to receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expectation {
    /// Parameter name to required value. Empty means no constraints.
    pub request_params: HashMap<String, String>,
    pub status: u16,
    pub body: String,
    /// Added to every response produced while evaluating this expectation,
    /// including not-found and body-read-failure responses.
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Stopped,
    Running,
}

/// The registration table: route key -> method -> [`Expectation`].
///
/// The table may only be mutated while [`Lifecycle::Stopped`]; mutation
/// calls issued while `Running` fail and leave the table untouched. During
/// the `Running` phase the table is therefore read-only and safe to share
/// across any number of concurrent dispatcher invocations.
#[derive(Debug)]
pub(crate) struct RouteTable {
    entries: HashMap<String, HashMap<String, Expectation>>,
    lifecycle: Lifecycle,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lifecycle: Lifecycle::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn mark_started(&mut self) {
        self.lifecycle = Lifecycle::Running;
    }

    pub fn mark_stopped(&mut self) {
        self.lifecycle = Lifecycle::Stopped;
    }

    /// Registers `expectation` under (route, method), overwriting any prior
    /// entry for that pair. Returns false if the table is running.
    pub fn add(&mut self, route: String, method: String, expectation: Expectation) -> bool {
        if self.is_running() {
            return false;
        }

        self.entries
            .entry(route)
            .or_default()
            .insert(method, expectation);

        true
    }

    /// Removes the entry for (route, method). Returns false if the table is
    /// running or the pair was never registered. Removing the last method
    /// under a route removes the route itself.
    pub fn remove(&mut self, route: &str, method: &str) -> bool {
        if self.is_running() {
            return false;
        }

        let Some(methods) = self.entries.get_mut(route) else {
            return false;
        };

        if methods.remove(method).is_none() {
            return false;
        }

        if methods.is_empty() {
            self.entries.remove(route);
        }

        true
    }

    /// Returns the method map registered under `route`, if any.
    ///
    /// The dispatcher looks up the route and the method in two steps so the
    /// two kinds of miss can be told apart.
    pub fn methods(&self, route: &str) -> Option<&HashMap<String, Expectation>> {
        self.entries.get(route)
    }
}
