//! Low-level persistence: direct diesel access to the action table, the
//! parent `instance_actions` aggregate, and the per-item tables. Higher-level
//! modules (loader, resolver, executor, refresh) work with [`crate::task::Task`]
//! and call through this module rather than touching `diesel` directly.

use diesel::prelude::*;

use crate::db::models::{
    ActionRow, ClassificationRow, InterfaceRow, NetRow, SfRow, SfiRow, SfpRow, VmRow,
};
use crate::db::schema::{
    instance_actions, instance_classifications, instance_interfaces, instance_nets, instance_sfis,
    instance_sfps, instance_sfs, instance_vms, vim_wim_actions,
};
use crate::db::Database;
use crate::error::Error;

/// Thin wrapper around the action-store connection pool.
#[derive(Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Wraps an existing connection pool.
    pub fn new(db: Database) -> Store {
        Store { db }
    }

    /// Reads one key-ordered page of up to `limit` rows for `datacenter_vim_id`,
    /// starting at `item_id >= after_item_id`. Mirrors the loader's pagination
    /// cursor (`(item_id, item, created_at)`).
    pub async fn load_page(
        &self,
        datacenter_vim_id: &str,
        after_item_id: &str,
        limit: i64,
    ) -> Result<Vec<ActionRow>, Error> {
        let datacenter_vim_id = datacenter_vim_id.to_string();
        let after_item_id = after_item_id.to_string();
        self.db
            .run(move |conn| {
                vim_wim_actions::table
                    .filter(vim_wim_actions::datacenter_vim_id.eq(datacenter_vim_id))
                    .filter(vim_wim_actions::item_id.ge(after_item_id))
                    .order((
                        vim_wim_actions::item_id.asc(),
                        vim_wim_actions::item.asc(),
                        vim_wim_actions::created_at.asc(),
                    ))
                    .limit(limit)
                    .load::<ActionRow>(conn)
            })
            .await
            .map_err(Error::from)
    }

    /// Fetches a single task by its primary key, used to resolve a dependency
    /// reference that falls outside the batch currently in memory.
    pub async fn fetch_task(
        &self,
        instance_action_id: &str,
        task_index: i32,
    ) -> Result<Option<ActionRow>, Error> {
        let instance_action_id = instance_action_id.to_string();
        self.db
            .run(move |conn| {
                vim_wim_actions::table
                    .filter(vim_wim_actions::instance_action_id.eq(instance_action_id))
                    .filter(vim_wim_actions::task_index.eq(task_index))
                    .first::<ActionRow>(conn)
                    .optional()
            })
            .await
            .map_err(Error::from)
    }

    /// Looks up a network's per-item row by its VIM-side id, used to seed a
    /// VM interface's `sdn_net_id` at CREATE time and to recover a FIND's
    /// overlay mirror at supersession time.
    pub async fn fetch_net_by_vim_id(&self, vim_net_id: &str) -> Result<Option<NetRow>, Error> {
        let vim_net_id = vim_net_id.to_string();
        self.db
            .run(move |conn| {
                instance_nets::table
                    .filter(instance_nets::vim_net_id.eq(vim_net_id))
                    .first::<NetRow>(conn)
                    .optional()
            })
            .await
            .map_err(Error::from)
    }

    /// Persists a task row, updating it in place if it already exists.
    pub async fn save_task(&self, row: ActionRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(
                    vim_wim_actions::table
                        .filter(vim_wim_actions::instance_action_id.eq(row.instance_action_id.clone()))
                        .filter(vim_wim_actions::task_index.eq(row.task_index)),
                )
                .set(&row)
                .execute(conn)?;

                if affected == 0 {
                    diesel::insert_into(vim_wim_actions::table)
                        .values(&row)
                        .execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Increments the parent action's `number_done` or `number_failed` counter
    /// and bumps its `modified_at` timestamp.
    pub async fn bump_parent_action(&self, instance_action_id: &str, succeeded: bool, now: &str) -> Result<(), Error> {
        let instance_action_id = instance_action_id.to_string();
        let now = now.to_string();
        self.db
            .run(move |conn| {
                let target = instance_actions::table.filter(instance_actions::uuid.eq(&instance_action_id));
                if succeeded {
                    diesel::update(target)
                        .set((
                            instance_actions::number_done.eq(instance_actions::number_done + 1),
                            instance_actions::modified_at.eq(now),
                        ))
                        .execute(conn)
                } else {
                    diesel::update(target)
                        .set((
                            instance_actions::number_failed.eq(instance_actions::number_failed + 1),
                            instance_actions::modified_at.eq(now),
                        ))
                        .execute(conn)
                }
            })
            .await
            .map(|_| ())
            .map_err(Error::from)
    }

    /// Upserts a VM's per-item row.
    pub async fn save_vm(&self, row: VmRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(instance_vms::table.filter(instance_vms::item_id.eq(row.item_id.clone())))
                    .set(&row)
                    .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_vms::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a network's per-item row.
    pub async fn save_net(&self, row: NetRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(instance_nets::table.filter(instance_nets::item_id.eq(row.item_id.clone())))
                    .set(&row)
                    .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_nets::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a VM interface's per-item row.
    pub async fn save_interface(&self, row: InterfaceRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(
                    instance_interfaces::table
                        .filter(instance_interfaces::item_id.eq(row.item_id.clone()))
                        .filter(instance_interfaces::iface_name.eq(row.iface_name.clone())),
                )
                .set(&row)
                .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_interfaces::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a service function instance's per-item row.
    pub async fn save_sfi(&self, row: SfiRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(instance_sfis::table.filter(instance_sfis::item_id.eq(row.item_id.clone())))
                    .set(&row)
                    .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_sfis::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a service function's per-item row.
    pub async fn save_sf(&self, row: SfRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(instance_sfs::table.filter(instance_sfs::item_id.eq(row.item_id.clone())))
                    .set(&row)
                    .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_sfs::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a classification's per-item row.
    pub async fn save_classification(&self, row: ClassificationRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(
                    instance_classifications::table.filter(instance_classifications::item_id.eq(row.item_id.clone())),
                )
                .set(&row)
                .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_classifications::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Upserts a service function path's per-item row.
    pub async fn save_sfp(&self, row: SfpRow) -> Result<(), Error> {
        self.db
            .run(move |conn| {
                let affected = diesel::update(instance_sfps::table.filter(instance_sfps::item_id.eq(row.item_id.clone())))
                    .set(&row)
                    .execute(conn)?;
                if affected == 0 {
                    diesel::insert_into(instance_sfps::table).values(&row).execute(conn)?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
