//! The per-tenant worker loop: reloads the backlog at start-up, then
//! alternates between draining pending tasks and running refresh passes
//! until told to reload or exit.
//!
//! Grounded on `run()`: an outer loop that (re)builds the driver and reloads
//! the backlog, and an inner loop that drains the control inbox, processes
//! pending tasks, runs one refresh pass, and sleeps a second when a whole
//! iteration did nothing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::State;
use crate::db::models::{ClassificationRow, InterfaceRow, NetRow, SfRow, SfiRow, SfpRow, VmRow};
use crate::error::Error;
use crate::executor::{self, Outcome};
use crate::loader;
use crate::refresh::{self, RefreshQueue};
use crate::resolver;
use crate::store::Store;
use crate::task::{Item, Status, Task};

/// A message delivered to a running worker from the rest of the process
/// (e.g. the API layer that enqueues new orchestration requests).
pub enum Control {
    /// A freshly-inserted batch of tasks, to be resolved and queued for execution.
    NewTasks(Vec<Task>),
    /// Drop the in-memory backlog and reload it from storage.
    Reload,
    /// Stop the worker loop.
    Exit,
}

/// Drives one VIM tenant: owns the in-memory pending queue and refresh
/// queue, and the connection to its configured driver/connector/overlay.
pub struct Worker {
    state: State,
    store: Store,
    pending: VecDeque<Task>,
    queue: RefreshQueue,
}

impl Worker {
    pub fn new(state: State) -> Worker {
        let store = Store::new(state.db.clone());
        Worker { state, store, pending: VecDeque::new(), queue: RefreshQueue::new() }
    }

    /// Runs until told to exit, reloading the backlog whenever told to or
    /// whenever the loop starts.
    pub async fn run(mut self, mut control_rx: mpsc::Receiver<Control>) -> Result<(), Error> {
        loop {
            info!(worker = %self.state.general.name, "reloading backlog");
            self.reload().await?;

            loop {
                let mut reload_requested = false;
                while let Ok(message) = control_rx.try_recv() {
                    match message {
                        Control::NewTasks(tasks) => self.enqueue_new(tasks).await?,
                        Control::Reload => {
                            reload_requested = true;
                            break;
                        }
                        Control::Exit => {
                            info!(worker = %self.state.general.name, "exiting");
                            return Ok(());
                        }
                    }
                }
                if reload_requested {
                    break;
                }

                let processed_pending = self.process_pending().await?;
                let processed_refresh = self.run_refresh_pass().await?;

                if processed_pending == 0 && processed_refresh == 0 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn reload(&mut self) -> Result<(), Error> {
        let groups = loader::load_pending(&self.store, &self.state.general.datacenter_tenant_id).await?;
        let resolved = resolver::resolve_batch(groups, &self.store).await?;
        self.pending = resolved.into();
        Ok(())
    }

    async fn enqueue_new(&mut self, tasks: Vec<Task>) -> Result<(), Error> {
        let groups = loader::group_fresh_batch(tasks);
        let resolved = resolver::resolve_batch(groups, &self.store).await?;
        for task in resolved {
            self.pending.push_back(task);
        }
        Ok(())
    }

    /// Processes queued tasks until the queue is drained or the per-pass
    /// CREATE cap is reached.
    async fn process_pending(&mut self) -> Result<usize, Error> {
        let mut processed = 0;
        let mut creates = 0;

        while let Some(task) = self.pending.pop_front() {
            processed += 1;
            let task_label = format!("{}.{}", task.instance_action_id, task.task_index);
            let outcome = executor::execute_one(
                task,
                Arc::clone(&self.state.vim),
                self.state.sdn.clone(),
                &self.store,
                self.state.refresh.max_dependency_retries,
            )
            .await;

            match outcome {
                Outcome::Requeue(task) => {
                    self.pending.push_back(task);
                }
                Outcome::Settled { task, counts_as_done, was_create } => {
                    if was_create {
                        creates += 1;
                    }
                    debug!(task = %task_label, status = ?task.status, "task settled");
                    self.persist_settled(task, counts_as_done).await?;
                }
            }

            if creates >= self.state.refresh.max_creates_per_pass {
                break;
            }
        }

        Ok(processed)
    }

    async fn persist_settled(&mut self, task: Task, counts_as_done: Option<bool>) -> Result<(), Error> {
        self.store.save_task(task.to_row()?).await?;

        if let Some(succeeded) = counts_as_done {
            let now = chrono::Local::now().naive_local().format(crate::db::DATETIME_FORMAT).to_string();
            if let Err(err) = self.store.bump_parent_action(&task.instance_action_id, succeeded, &now).await {
                error!(instance_action_id = %task.instance_action_id, error = %err, "failed to bump parent action counters");
            }
        }

        self.sync_item_row(&task).await?;

        let refreshable = matches!(task.item, Item::Vms | Item::Nets);
        if refreshable && matches!(task.status, Status::Build | Status::Done) {
            self.queue.insert(task, chrono::Local::now().naive_local());
        }

        Ok(())
    }

    async fn sync_item_row(&mut self, task: &Task) -> Result<(), Error> {
        let vim_status = task.extra.vim_status.clone().unwrap_or_else(|| match task.status {
            Status::Build => "BUILD".to_string(),
            Status::Done => "ACTIVE".to_string(),
            _ => "ERROR".to_string(),
        });

        match task.item {
            Item::Vms => {
                self.store
                    .save_vm(VmRow {
                        item_id: task.item_id.clone(),
                        vim_vm_id: task.vim_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                        vim_info: None,
                    })
                    .await?;
            }
            Item::Nets => {
                self.store
                    .save_net(NetRow {
                        item_id: task.item_id.clone(),
                        vim_net_id: task.vim_id.clone(),
                        sdn_net_id: task.extra.sdn_net_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                        vim_info: None,
                        created: task.extra.created,
                    })
                    .await?;
            }
            Item::Sfis => {
                self.store
                    .save_sfi(SfiRow {
                        item_id: task.item_id.clone(),
                        vim_sfi_id: task.vim_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                    })
                    .await?;
            }
            Item::Sfs => {
                self.store
                    .save_sf(SfRow {
                        item_id: task.item_id.clone(),
                        vim_sf_id: task.vim_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                    })
                    .await?;
            }
            Item::Classifications => {
                self.store
                    .save_classification(ClassificationRow {
                        item_id: task.item_id.clone(),
                        vim_classification_id: task.vim_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                    })
                    .await?;
            }
            Item::Sfps => {
                self.store
                    .save_sfp(SfpRow {
                        item_id: task.item_id.clone(),
                        vim_sfp_id: task.vim_id.clone(),
                        status: vim_status,
                        error_msg: task.error_msg.clone(),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_refresh_pass(&mut self) -> Result<usize, Error> {
        if self.queue.is_empty() {
            return Ok(0);
        }
        let now: NaiveDateTime = chrono::Local::now().naive_local();
        let processed = refresh::run_pass(
            &mut self.queue,
            now,
            Arc::clone(&self.state.vim),
            self.state.sdn.clone(),
            &self.store,
            self.state.refresh.max_per_pass,
            chrono::Duration::seconds(self.state.refresh.build_interval_secs as i64),
            chrono::Duration::seconds(self.state.refresh.active_interval_secs as i64),
        )
        .await;

        match processed {
            Ok(count) => Ok(count),
            Err(err) => {
                warn!(worker = %self.state.general.name, error = %err, "refresh pass failed");
                Err(err)
            }
        }
    }
}
