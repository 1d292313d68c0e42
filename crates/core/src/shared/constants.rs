pub const POSE_MODEL_NAME: &str = "yolo11n-pose.onnx";
pub const POSE_MODEL_URL: &str =
    "https://github.com/proctorguard/proctorguard/releases/download/v0.1.0/yolo11n-pose.onnx";
