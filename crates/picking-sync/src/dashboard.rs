//! Role-routed composition of hooks.
//!
//! The mounted [`Screen`] follows the AuthState: nothing is mounted while it's
//! loading, sign-in is required without a Profile, and otherwise exactly one
//! [`Dashboard`] is mounted for the Profile's role.

use crate::hooks::{
    CategoryPerformanceHook, Chat, DamageReports, InventoryHook, PerformanceMetrics, PickLists,
    RealTimePickers, TaskAssignments,
};
use crate::{AuthState, Context, Error};
use futures::future::{BoxFuture, FutureExt};
use models::Role;

/// Kind of Dashboard mounted for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Picker,
    Supervisor,
    Admin,
}

/// Map a role to the Kind of its Dashboard. Roles are distinct:
/// an admin is never routed to the supervisor dashboard.
pub fn route(role: Role) -> Kind {
    match role {
        Role::Picker => Kind::Picker,
        Role::Supervisor => Kind::Supervisor,
        Role::Admin => Kind::Admin,
    }
}

pub enum Screen {
    Loading,
    /// Sign-in is required. `error` is set if the user authenticated,
    /// but their Profile couldn't be loaded.
    SignIn { error: Option<Error> },
    Dashboard(Dashboard),
}

impl Screen {
    /// Mount the Screen of the current AuthState.
    pub async fn mount(ctx: &Context) -> Self {
        match ctx.auth_state() {
            AuthState::Loading => Screen::Loading,
            AuthState::Unauthenticated => Screen::SignIn { error: None },
            AuthState::Authenticated {
                profile: None,
                profile_error,
                ..
            } => Screen::SignIn {
                error: profile_error,
            },
            AuthState::Authenticated {
                profile: Some(profile),
                ..
            } => Screen::Dashboard(Dashboard::mount(ctx, route(profile.role)).await),
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        match self {
            Screen::Dashboard(dashboard) => Some(dashboard),
            _ => None,
        }
    }
}

pub enum Dashboard {
    Picker(PickerDashboard),
    Supervisor(SupervisorDashboard),
    Admin(AdminDashboard),
}

/// A picker works their own pick lists, chats, and reports damage.
pub struct PickerDashboard {
    pub pick_lists: PickLists,
    pub chat: Chat,
    pub damage_reports: DamageReports,
}

/// A supervisor monitors pickers and issues work.
pub struct SupervisorDashboard {
    pub pickers: RealTimePickers,
    pub tasks: TaskAssignments,
    pub metrics: PerformanceMetrics,
    pub categories: CategoryPerformanceHook,
    pub inventory: InventoryHook,
    pub chat: Chat,
}

/// An admin sees everything a supervisor does,
/// plus the pick lists of the whole warehouse.
pub struct AdminDashboard {
    pub supervisor: SupervisorDashboard,
    pub pick_lists: PickLists,
}

impl Dashboard {
    pub async fn mount(ctx: &Context, kind: Kind) -> Self {
        tracing::debug!(?kind, "mounting dashboard");

        match kind {
            Kind::Picker => Dashboard::Picker(PickerDashboard {
                pick_lists: PickLists::mount(ctx).await,
                chat: Chat::mount(ctx).await,
                damage_reports: DamageReports::mount(ctx).await,
            }),
            Kind::Supervisor => Dashboard::Supervisor(SupervisorDashboard::mount(ctx).await),
            Kind::Admin => Dashboard::Admin(AdminDashboard {
                supervisor: SupervisorDashboard::mount(ctx).await,
                pick_lists: PickLists::mount(ctx).await,
            }),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Dashboard::Picker(_) => Kind::Picker,
            Dashboard::Supervisor(_) => Kind::Supervisor,
            Dashboard::Admin(_) => Kind::Admin,
        }
    }

    /// True while any hook of the Dashboard has yet to load.
    pub fn is_loading(&self) -> bool {
        match self {
            Dashboard::Picker(d) => {
                d.pick_lists.is_loading() || d.chat.is_loading() || d.damage_reports.is_loading()
            }
            Dashboard::Supervisor(d) => d.is_loading(),
            Dashboard::Admin(d) => d.supervisor.is_loading() || d.pick_lists.is_loading(),
        }
    }

    /// Wait for the data of any hook of the Dashboard to change.
    pub async fn changed(&mut self) {
        let mut changes: Vec<BoxFuture<'_, ()>> = Vec::new();

        match self {
            Dashboard::Picker(d) => {
                changes.push(d.pick_lists.changed().boxed());
                changes.push(d.chat.changed().boxed());
                changes.push(d.damage_reports.changed().boxed());
            }
            Dashboard::Supervisor(d) => d.push_changes(&mut changes),
            Dashboard::Admin(d) => {
                d.supervisor.push_changes(&mut changes);
                changes.push(d.pick_lists.changed().boxed());
            }
        }
        futures::future::select_all(changes).await;
    }
}

impl SupervisorDashboard {
    async fn mount(ctx: &Context) -> Self {
        Self {
            pickers: RealTimePickers::mount(ctx).await,
            tasks: TaskAssignments::mount(ctx).await,
            metrics: PerformanceMetrics::mount(ctx).await,
            categories: CategoryPerformanceHook::mount(ctx).await,
            inventory: InventoryHook::mount(ctx).await,
            chat: Chat::mount(ctx).await,
        }
    }

    fn is_loading(&self) -> bool {
        self.pickers.is_loading()
            || self.tasks.is_loading()
            || self.metrics.is_loading()
            || self.categories.is_loading()
            || self.inventory.is_loading()
            || self.chat.is_loading()
    }

    fn push_changes<'a>(&'a mut self, changes: &mut Vec<BoxFuture<'a, ()>>) {
        changes.push(self.pickers.changed().boxed());
        changes.push(self.tasks.changed().boxed());
        changes.push(self.metrics.changed().boxed());
        changes.push(self.categories.changed().boxed());
        changes.push(self.inventory.changed().boxed());
        changes.push(self.chat.changed().boxed());
    }
}
