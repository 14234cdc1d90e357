#[derive(Debug)]
pub struct ConfigHint {
    pub key: &'static str,
    pub description: &'static str,
}

pub const CONFIG_HINTS: &[ConfigHint] = &[
    ConfigHint {
        key: "anti_entropy.rendezvous_timeout_ms",
        description: "How long an unmatched tree waits for its counterpart, in milliseconds.",
    },
    ConfigHint {
        key: "anti_entropy.tree_max_size",
        description: "Maximum number of leaves per validation tree, a power of two such as 32768.",
    },
    ConfigHint {
        key: "anti_entropy.hash_depth",
        description: "Maximum depth of a tree leaf, at most 127.",
    },
    ConfigHint {
        key: "anti_entropy.validation_concurrency",
        description: "Validations allowed to scan storage at once, at least 1.",
    },
    ConfigHint {
        key: "anti_entropy.stream_concurrency",
        description: "Outbound repair transfers allowed at once, at least 1.",
    },
    ConfigHint {
        key: "anti_entropy.channel_capacity",
        description: "Commands buffered in front of the repair worker.",
    },
    ConfigHint {
        key: "read.replication_factor",
        description: "Replicas holding each row; bounds how many responses a read may wait for.",
    },
];

#[must_use]
pub fn hint_for(key: &str) -> Option<&'static ConfigHint> {
    CONFIG_HINTS.iter().find(|hint| hint.key == key)
}
