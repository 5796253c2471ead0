use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Asks the shell's router to leave the form.
pub struct Navigator<E> {
    context: CapabilityContext<NavigatorOperation, E>,
}

impl<Ev> Capability<Ev> for Navigator<Ev> {
    type Operation = NavigatorOperation;
    type MappedSelf<MappedEv> = Navigator<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigator::new(self.context.map_event(f))
    }
}

impl<E> Navigator<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<NavigatorOperation, E>) -> Self {
        Self { context }
    }

    pub fn navigate(&self, route: impl Into<String>) {
        let context = self.context.clone();
        let operation = NavigatorOperation::Navigate {
            route: route.into(),
        };
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NavigatorOperation {
    Navigate { route: String },
}

impl Operation for NavigatorOperation {
    type Output = ();
}
