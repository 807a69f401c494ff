mod bridge_flow;
mod handles;
