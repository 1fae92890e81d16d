table! {
    /// The parent high-level action (one row per NS/VNF instantiation request).
    instance_actions (uuid) {
        /// The parent action's opaque identifier.
        uuid -> Varchar,
        /// Number of child tasks that reached DONE.
        number_done -> Bigint,
        /// Number of child tasks that reached FAILED.
        number_failed -> Bigint,
        /// Last time any child task of this action changed state.
        modified_at -> Varchar,
    }
}

table! {
    /// The action table: one row per task, the worker's unit of work.
    vim_wim_actions (instance_action_id, task_index) {
        /// The parent action this task belongs to.
        instance_action_id -> Varchar,
        /// The task's index within its parent, unique per parent.
        task_index -> Integer,
        /// Routes this task to exactly one worker.
        datacenter_vim_id -> Varchar,
        /// The VIM-side identifier, once known.
        vim_id -> Nullable<Varchar>,
        /// The logical item category (`"vms"`, `"nets"`, `"sfis"`, ...).
        item -> Varchar,
        /// Opaque id of the logical object in the local store.
        item_id -> Varchar,
        /// CREATE, DELETE or FIND.
        action -> Varchar,
        /// SCHEDULED, BUILD, DONE, FAILED or SUPERSEDED.
        status -> Varchar,
        /// The task's structured payload, serialised as YAML.
        extra -> Text,
        /// Truncated error message, if the task failed.
        error_msg -> Nullable<Varchar>,
        /// Creation timestamp.
        created_at -> Varchar,
        /// Last modification timestamp; also the refresh-queue sort key.
        modified_at -> Varchar,
    }
}

table! {
    /// Per-item state for VM instances.
    instance_vms (item_id) {
        /// The logical VM's id in the local store.
        item_id -> Varchar,
        /// The VIM-side VM id.
        vim_vm_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
        /// Opaque VIM-reported detail blob (JSON).
        vim_info -> Nullable<Text>,
    }
}

table! {
    /// Per-item state for networks.
    instance_nets (item_id) {
        /// The logical network's id in the local store.
        item_id -> Varchar,
        /// The VIM-side network id.
        vim_net_id -> Nullable<Varchar>,
        /// The mirrored SDN overlay network id, if any.
        sdn_net_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
        /// Opaque VIM-reported detail blob (JSON).
        vim_info -> Nullable<Text>,
        /// Whether this worker created the VIM-side object (and thus owns its deletion).
        created -> Bool,
    }
}

table! {
    /// Per-interface state, one row per VM NIC.
    instance_interfaces (item_id, iface_name) {
        /// The owning VM's logical id.
        item_id -> Varchar,
        /// The interface's name within its VM.
        iface_name -> Varchar,
        /// The VIM-reported interface id.
        vim_interface_id -> Nullable<Varchar>,
        /// The interface's MAC address.
        mac_address -> Nullable<Varchar>,
        /// The interface's assigned IP address.
        ip_address -> Nullable<Varchar>,
        /// The interface's VLAN tag, if segmented.
        vlan -> Nullable<Integer>,
        /// The compute node's PCI address the interface is bound to, if known.
        pci -> Nullable<Varchar>,
        /// The mirrored SDN external port id, if any.
        sdn_port_id -> Nullable<Varchar>,
    }
}

table! {
    /// Per-item state for service function instances.
    instance_sfis (item_id) {
        /// The logical SFI's id in the local store.
        item_id -> Varchar,
        /// The VIM-side SFI id.
        vim_sfi_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
    }
}

table! {
    /// Per-item state for service functions.
    instance_sfs (item_id) {
        /// The logical SF's id in the local store.
        item_id -> Varchar,
        /// The VIM-side SF id.
        vim_sf_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
    }
}

table! {
    /// Per-item state for classifications.
    instance_classifications (item_id) {
        /// The logical classification's id in the local store.
        item_id -> Varchar,
        /// The VIM-side classification id.
        vim_classification_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
    }
}

table! {
    /// Per-item state for service function paths.
    instance_sfps (item_id) {
        /// The logical SFP's id in the local store.
        item_id -> Varchar,
        /// The VIM-side SFP id.
        vim_sfp_id -> Nullable<Varchar>,
        /// BUILD, ACTIVE, ERROR or VIM_ERROR.
        status -> Varchar,
        /// Last known error message, if any.
        error_msg -> Nullable<Varchar>,
    }
}

joinable!(vim_wim_actions -> instance_actions (instance_action_id));

allow_tables_to_appear_in_same_query!(
    instance_actions,
    vim_wim_actions,
    instance_vms,
    instance_nets,
    instance_interfaces,
    instance_sfis,
    instance_sfs,
    instance_classifications,
    instance_sfps,
);
