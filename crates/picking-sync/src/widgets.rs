//! Mutation widgets: forms which validate local input and submit it
//! through exactly one mutation of a hook.
//!
//! A Form is Idle until submitted. Input which fails validation is rejected
//! without leaving Idle. Otherwise the Form is Submitting until the mutation
//! completes, and then returns to Idle: reset upon success, or with its
//! input preserved upon failure.

use crate::hooks::{Chat, DamageReports, TaskAssignments};
use crate::Error;
use models::{task_status, ActivityLog, ChatMessage, DamageReport, NewTaskAssignment, TaskAssignment};
use std::future::Future;
use tokio::sync::watch;
use validator::{Validate, ValidationError, ValidationErrors};

/// Kinds of damage which may be reported.
pub const DAMAGE_TYPES: &[&str] = &["packaging", "expiry", "quality", "wrong-item", "quantity", "other"];

/// Kinds of tasks which may be assigned.
pub const TASK_TYPES: &[&str] = &["pick_list", "inventory_check", "quality_control", "special_order"];

pub const PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Submitting,
}

/// Form holds the local input of a widget.
#[derive(Debug)]
pub struct Form<F> {
    fields: F,
    status: watch::Sender<Status>,
    last_error: Option<Error>,
}

impl<F: Default + Clone + Validate> Default for Form<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Default + Clone + Validate> Form<F> {
    pub fn new() -> Self {
        Self {
            fields: F::default(),
            status: watch::channel(Status::Idle).0,
            last_error: None,
        }
    }

    pub fn fields(&self) -> &F {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut F {
        &mut self.fields
    }

    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Receiver of Status changes. A submission holds the Form exclusively,
    /// so other tasks observe Status::Submitting through this receiver.
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Error of the last submission, if it failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Validate the fields and submit them with `mutate`.
    pub async fn submit<T, M, Fut>(&mut self, mutate: M) -> Result<T, Error>
    where
        M: FnOnce(F) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let fields = self.begin()?;
        let result = mutate(fields).await;
        self.finish(&result);
        result
    }

    fn begin(&mut self) -> Result<F, Error> {
        if let Err(errors) = self.fields.validate() {
            let err = Error::from(errors);
            self.last_error = Some(err.clone());
            return Err(err);
        }
        self.status.send_replace(Status::Submitting);
        self.last_error = None;
        Ok(self.fields.clone())
    }

    fn finish<T>(&mut self, result: &Result<T, Error>) {
        match result {
            Ok(_) => self.fields = F::default(),
            Err(err) => self.last_error = Some(err.clone()),
        }
        self.status.send_replace(Status::Idle);
    }
}

// Add a "required" error of `field` if `value` is blank.
fn require(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, ValidationError::new("required"));
    }
}

fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskAssignmentFields {
    pub picker_id: Option<uuid::Uuid>,
    pub task_type: String,
    pub priority: String,
    pub due_date: Option<chrono::NaiveDate>,
    pub notes: String,
}

impl Default for TaskAssignmentFields {
    fn default() -> Self {
        Self {
            picker_id: None,
            task_type: "pick_list".to_string(),
            priority: "medium".to_string(),
            due_date: None,
            notes: String::new(),
        }
    }
}

impl Validate for TaskAssignmentFields {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.picker_id.is_none() {
            errors.add("picker_id", ValidationError::new("required"));
        }
        require(&mut errors, "task_type", &self.task_type);
        require(&mut errors, "priority", &self.priority);

        into_result(errors)
    }
}

impl TaskAssignmentFields {
    /// Build the NewTaskAssignment of validated fields.
    pub fn into_new(self) -> Result<NewTaskAssignment, Error> {
        let picker_id = self
            .picker_id
            .ok_or_else(|| Error::Validation(vec!["picker_id".to_string()]))?;
        let notes = self.notes.trim();

        Ok(NewTaskAssignment {
            picker_id,
            task_type: self.task_type.trim().to_string(),
            priority: self.priority.trim().to_string(),
            status: task_status::PENDING.to_string(),
            due_date: self.due_date,
            notes: (!notes.is_empty()).then(|| notes.to_string()),
            task_id: None,
        })
    }
}

impl Form<TaskAssignmentFields> {
    pub async fn assign(&mut self, tasks: &TaskAssignments) -> Result<TaskAssignment, Error> {
        self.submit(|fields| async move { tasks.create(fields.into_new()?).await })
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatFields {
    pub message_text: String,
    pub recipient_id: Option<uuid::Uuid>,
    pub message_type: String,
    pub is_broadcast: bool,
}

impl Default for ChatFields {
    fn default() -> Self {
        Self {
            message_text: String::new(),
            recipient_id: None,
            message_type: crate::hooks::chat::GENERAL.to_string(),
            is_broadcast: false,
        }
    }
}

// A recipient is required unless the message is a broadcast.
impl Validate for ChatFields {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "message_text", &self.message_text);
        if !self.is_broadcast && self.recipient_id.is_none() {
            errors.add("recipient_id", ValidationError::new("required"));
        }

        into_result(errors)
    }
}

impl Form<ChatFields> {
    pub async fn send(&mut self, chat: &Chat) -> Result<ChatMessage, Error> {
        self.submit(|fields| async move {
            let recipient_id = if fields.is_broadcast {
                None
            } else {
                fields.recipient_id
            };
            chat.send(
                fields.message_text,
                recipient_id,
                Some(fields.message_type),
                fields.is_broadcast,
            )
            .await
        })
        .await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageReportFields {
    pub sku: String,
    pub item_name: String,
    pub damage_type: String,
    pub description: String,
    pub photos: Vec<String>,
}

impl Validate for DamageReportFields {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "sku", &self.sku);
        require(&mut errors, "damage_type", &self.damage_type);
        require(&mut errors, "description", &self.description);

        into_result(errors)
    }
}

impl Form<DamageReportFields> {
    pub async fn report(&mut self, reports: &DamageReports) -> Result<ActivityLog, Error> {
        self.submit(|fields| async move {
            let report = DamageReport {
                sku: fields.sku.trim().to_string(),
                item_name: fields.item_name.trim().to_string(),
                damage_type: fields.damage_type.trim().to_string(),
                photos: fields.photos,
                status: "pending".to_string(),
            };
            reports.report_damage(report, fields.description).await
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invalid_input_never_submits() {
        let calls = AtomicUsize::new(0);
        let mut form = Form::<DamageReportFields>::new();
        form.fields_mut().sku = "SKU-1".to_string();

        let err = form
            .submit(|_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "missing required fields: damage_type, description"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(form.status(), Status::Idle);
        assert_eq!(form.fields().sku, "SKU-1");
    }

    #[tokio::test]
    async fn test_success_resets_and_failure_preserves() {
        let mut form = Form::<ChatFields>::new();
        form.fields_mut().message_text = "dock 4 is clear".to_string();
        form.fields_mut().is_broadcast = true;

        let err = form
            .submit(|_| async {
                Err::<(), _>(Error::RemoteWrite(Arc::new(anyhow::anyhow!("offline"))))
            })
            .await
            .unwrap_err();
        assert_eq!(err.name(), "RemoteWriteFailure");
        assert_eq!(form.fields().message_text, "dock 4 is clear");
        assert_eq!(form.status(), Status::Idle);
        assert!(form.last_error().is_some());

        let sent = form
            .submit(|fields| async move { Ok(fields.message_text) })
            .await
            .unwrap();
        assert_eq!(sent, "dock 4 is clear");
        assert_eq!(form.fields(), &ChatFields::default());
        assert!(form.last_error().is_none());
    }

    #[tokio::test]
    async fn test_submitting_is_observable() {
        let mut form = Form::<ChatFields>::new();
        form.fields_mut().message_text = "forklift in aisle 9".to_string();
        form.fields_mut().is_broadcast = true;

        let mut status = form.watch_status();
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let submit = form.submit(move |fields| async move {
            released.await.ok();
            Ok(fields.message_text)
        });
        let observer = &mut status;
        let observe = async move {
            observer
                .wait_for(|status| *status == Status::Submitting)
                .await
                .unwrap();
            release.send(()).unwrap();
        };
        let (sent, ()) = tokio::join!(submit, observe);

        assert_eq!(sent.unwrap(), "forklift in aisle 9");
        assert_eq!(*status.borrow(), Status::Idle);
        assert_eq!(form.status(), Status::Idle);
    }

    #[test]
    fn test_blank_fields_are_missing() {
        let damage = DamageReportFields {
            sku: "  ".to_string(),
            damage_type: "expiry".to_string(),
            description: "\t\n".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Error::from(damage.validate().unwrap_err()).to_string(),
            "missing required fields: description, sku"
        );

        let task = TaskAssignmentFields {
            picker_id: Some(uuid::Uuid::new_v4()),
            task_type: " ".to_string(),
            priority: "high".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Error::from(task.validate().unwrap_err()).to_string(),
            "missing required fields: task_type"
        );

        let chat = ChatFields {
            message_text: "   ".to_string(),
            is_broadcast: true,
            ..Default::default()
        };
        assert!(chat.validate().is_err());
    }

    #[test]
    fn test_chat_recipient_is_required_unless_broadcast() {
        let mut fields = ChatFields {
            message_text: "hello".to_string(),
            ..Default::default()
        };
        assert!(fields.validate().is_err());

        fields.is_broadcast = true;
        assert!(fields.validate().is_ok());

        fields.is_broadcast = false;
        fields.recipient_id = Some(uuid::Uuid::new_v4());
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn test_task_fields() {
        let mut fields = TaskAssignmentFields::default();
        assert!(fields.validate().is_err());

        let picker = uuid::Uuid::new_v4();
        fields.picker_id = Some(picker);
        fields.notes = "  ".to_string();
        assert!(fields.validate().is_ok());

        let new = fields.into_new().unwrap();
        assert_eq!(new.picker_id, picker);
        assert_eq!(new.status, "pending");
        assert_eq!(new.notes, None);
    }
}
