use nu_plugin::{serve_plugin, MsgPackSerializer};
use nu_plugin_scoutstats::ScoutStatsPlugin;

fn main() {
    serve_plugin(&ScoutStatsPlugin, MsgPackSerializer {})
}
